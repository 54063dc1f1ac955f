// Configuration management with layered configuration (file, env)

use crate::registrar::{LogonMode, ResilienceFlags};
use crate::schedule::{parse_timezone, Cadence, TimeOfDay};
use chrono::Weekday;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub task: TaskConfig,
    pub runner: RunnerConfig,
    pub entrypoint: EntrypointConfig,
    pub observability: ObservabilityConfig,
}

/// Scheduled task registration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Unique name within the host scheduler namespace
    pub name: String,
    pub cadence: Cadence,
    pub timezone: String,
    pub logon: LogonMode,
    /// Account the task runs under; None means the invoking user
    pub principal: Option<String>,
    /// Target command the scheduler fires (program followed by arguments)
    pub command: Vec<String>,
    pub resilience: ResilienceFlags,
}

/// Run bootstrapper settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Base directory all relative paths resolve against
    pub base_dir: String,
    /// Isolated environment directory, relative to base_dir
    pub env_dir: String,
    /// Interpreter path inside the environment directory
    pub interpreter: String,
    /// Module the pipeline entry point is invoked as (interpreter -m <module>)
    pub module: String,
    /// Append-only run log, relative to base_dir
    pub log_file: String,
}

/// Container entrypoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrypointConfig {
    pub migrate_command: Vec<String>,
    pub serve_command: Vec<String>,
    /// Default bind port; the PORT environment variable overrides it
    pub port: u16,
    /// Default upload storage path; the UPLOAD_DIR environment variable overrides it
    pub upload_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let defaults = Config::try_from(&Settings::default())?;

        let builder = Config::builder()
            .add_source(defaults)
            // Checked-in configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local overrides (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.task.name.trim().is_empty() {
            return Err("Task name cannot be empty".to_string());
        }
        if self.task.command.is_empty() {
            return Err("Task command cannot be empty".to_string());
        }
        if let Err(e) = parse_timezone(&self.task.timezone) {
            return Err(e.to_string());
        }

        if self.runner.env_dir.trim().is_empty() {
            return Err("Runner env_dir cannot be empty".to_string());
        }
        if self.runner.module.trim().is_empty() {
            return Err("Runner module cannot be empty".to_string());
        }
        if self.runner.log_file.trim().is_empty() {
            return Err("Runner log_file cannot be empty".to_string());
        }

        if self.entrypoint.migrate_command.is_empty() {
            return Err("Entrypoint migrate_command cannot be empty".to_string());
        }
        if self.entrypoint.serve_command.is_empty() {
            return Err("Entrypoint serve_command cannot be empty".to_string());
        }
        if self.entrypoint.port == 0 {
            return Err("Entrypoint port must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Non-fatal configuration warnings, logged at startup
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.runner.base_dir == "." {
            warnings.push(
                "runner.base_dir is the process working directory - scheduled runs should \
                 configure an absolute path"
                    .to_string(),
            );
        }

        if matches!(self.task.logon, LogonMode::ServiceForUser) && self.task.principal.is_none() {
            warnings.push(
                "S4U logon without an explicit principal registers the task for the invoking user"
                    .to_string(),
            );
        }

        warnings
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            task: TaskConfig {
                name: "DailyJobAgent".to_string(),
                cadence: Cadence::Weekly {
                    weekday: Weekday::Mon,
                    at: TimeOfDay { hour: 11, minute: 0 },
                },
                timezone: "America/New_York".to_string(),
                logon: LogonMode::ServiceForUser,
                principal: None,
                command: vec!["run-agent".to_string()],
                resilience: ResilienceFlags::default(),
            },
            runner: RunnerConfig {
                base_dir: ".".to_string(),
                env_dir: ".venv".to_string(),
                interpreter: default_interpreter(),
                module: "job_agent".to_string(),
                log_file: "logs/run.log".to_string(),
            },
            entrypoint: EntrypointConfig {
                migrate_command: vec![
                    "alembic".to_string(),
                    "upgrade".to_string(),
                    "head".to_string(),
                ],
                serve_command: vec![
                    "uvicorn".to_string(),
                    "job_agent.web.app:app".to_string(),
                ],
                port: 8000,
                upload_dir: "data/uploads".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

#[cfg(windows)]
fn default_interpreter() -> String {
    "Scripts/python.exe".to_string()
}

#[cfg(not(windows))]
fn default_interpreter() -> String {
    "bin/python".to_string()
}
