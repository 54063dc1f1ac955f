// Container entrypoint: apply migrations, then start the service
//
// Ordering is strict: the serve command is never spawned unless the migration
// command exits zero. There is no retry here; a failed migration fails the
// container and restart policy belongs to the orchestrator.

use crate::config::EntrypointConfig;
use crate::errors::EntrypointError;
use tokio::process::Command;
use tracing::{info, warn};

/// Composes the migrate-then-serve startup sequence
pub struct ContainerEntrypoint {
    config: EntrypointConfig,
    port: u16,
    upload_dir: String,
}

impl ContainerEntrypoint {
    pub fn new(config: EntrypointConfig, port: u16, upload_dir: String) -> Self {
        Self {
            config,
            port,
            upload_dir,
        }
    }

    /// Resolve PORT and UPLOAD_DIR from the process environment
    pub fn from_env(config: EntrypointConfig) -> Self {
        let port = resolve_port(std::env::var("PORT").ok().as_deref(), config.port);
        let upload_dir = resolve_upload_dir(
            std::env::var("UPLOAD_DIR").ok().as_deref(),
            &config.upload_dir,
        );
        Self::new(config, port, upload_dir)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn upload_dir(&self) -> &str {
        &self.upload_dir
    }

    /// Run migrations, then the service. Returns the service's exit code.
    #[tracing::instrument(skip(self), fields(port = self.port))]
    pub async fn start(&self) -> Result<i32, EntrypointError> {
        self.run_migrations().await?;
        self.serve().await
    }

    async fn run_migrations(&self) -> Result<(), EntrypointError> {
        let (program, args) = split_command(&self.config.migrate_command)
            .ok_or(EntrypointError::EmptyMigrateCommand)?;

        info!(program = %program, ?args, "Applying schema migrations");
        let status = Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| EntrypointError::SpawnFailed {
                program: program.to_string(),
                source: e,
            })?;

        if !status.success() {
            return Err(EntrypointError::MigrationFailed(status.code().unwrap_or(-1)));
        }
        info!("Migrations applied");
        Ok(())
    }

    async fn serve(&self) -> Result<i32, EntrypointError> {
        let (program, args) = split_command(&self.config.serve_command)
            .ok_or(EntrypointError::EmptyServeCommand)?;

        info!(
            program = %program,
            port = self.port,
            upload_dir = %self.upload_dir,
            "Starting service"
        );
        let status = Command::new(program)
            .args(args)
            .env("HOST", "0.0.0.0")
            .env("PORT", self.port.to_string())
            .env("UPLOAD_DIR", &self.upload_dir)
            .status()
            .await
            .map_err(|e| EntrypointError::SpawnFailed {
                program: program.to_string(),
                source: e,
            })?;

        Ok(status.code().unwrap_or(1))
    }
}

/// PORT from the environment, falling back to the configured default
pub fn resolve_port(env_value: Option<&str>, default: u16) -> u16 {
    match env_value {
        Some(raw) => match raw.parse::<u16>() {
            Ok(port) if port > 0 => port,
            _ => {
                warn!(value = %raw, default, "Ignoring invalid PORT value");
                default
            }
        },
        None => default,
    }
}

pub fn resolve_upload_dir(env_value: Option<&str>, default: &str) -> String {
    match env_value {
        Some(dir) if !dir.trim().is_empty() => dir.to_string(),
        _ => default.to_string(),
    }
}

fn split_command(command: &[String]) -> Option<(&str, &[String])> {
    let (program, args) = command.split_first()?;
    if program.trim().is_empty() {
        return None;
    }
    Some((program.as_str(), args))
}
