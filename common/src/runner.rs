// Run bootstrapper: environment check, argument passthrough, append-only log
//
// The bootstrapper never parses pipeline output or classifies pipeline
// failures. Diagnostics land in the run log; the caller (usually the host
// scheduler) observes only the exit code, which mirrors the pipeline's.

use crate::config::RunnerConfig;
use crate::errors::BootstrapError;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Prepares the isolated environment and invokes the pipeline entry point
pub struct RunBootstrapper {
    base_dir: PathBuf,
    config: RunnerConfig,
}

impl RunBootstrapper {
    /// All relative paths (environment, log) resolve against `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>, config: RunnerConfig) -> Self {
        Self {
            base_dir: base_dir.into(),
            config,
        }
    }

    pub fn from_config(config: RunnerConfig) -> Self {
        let base_dir = PathBuf::from(&config.base_dir);
        Self { base_dir, config }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Interpreter inside the isolated environment
    pub fn interpreter_path(&self) -> PathBuf {
        self.base_dir
            .join(&self.config.env_dir)
            .join(&self.config.interpreter)
    }

    pub fn log_path(&self) -> PathBuf {
        self.base_dir.join(&self.config.log_file)
    }

    /// Invoke the pipeline entry point, forwarding `args` verbatim.
    ///
    /// Returns the pipeline's exit code. Fails fast without spawning anything
    /// when the isolated environment is missing.
    #[tracing::instrument(skip(self, args))]
    pub async fn run<I>(&self, args: I) -> Result<i32, BootstrapError>
    where
        I: IntoIterator<Item = String>,
    {
        let interpreter = self.interpreter_path();
        if !interpreter.is_file() {
            return Err(BootstrapError::EnvironmentMissing {
                path: interpreter.display().to_string(),
                env_dir: self.config.env_dir.clone(),
            });
        }

        let log = self.open_log()?;
        let log_for_stderr = log.try_clone().map_err(|e| BootstrapError::LogUnavailable {
            path: self.log_path().display().to_string(),
            source: e,
        })?;

        let args: Vec<String> = args.into_iter().collect();
        info!(
            interpreter = %interpreter.display(),
            module = %self.config.module,
            ?args,
            log = %self.log_path().display(),
            "Invoking pipeline entry point"
        );

        let status = Command::new(&interpreter)
            .arg("-m")
            .arg(&self.config.module)
            .args(&args)
            .current_dir(&self.base_dir)
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_for_stderr))
            .status()
            .await
            .map_err(|e| BootstrapError::SpawnFailed {
                program: interpreter.display().to_string(),
                source: e,
            })?;

        // A signal-terminated pipeline has no code; report generic failure
        let code = status.code().unwrap_or(1);
        debug!(exit_code = code, "Pipeline exited");
        Ok(code)
    }

    /// Open the run log for appending, creating parent directories on demand
    fn open_log(&self) -> Result<std::fs::File, BootstrapError> {
        let path = self.log_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BootstrapError::LogUnavailable {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| BootstrapError::LogUnavailable {
                path: path.display().to_string(),
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn runner_config() -> RunnerConfig {
        let mut config = Settings::default().runner;
        config.env_dir = "venv".to_string();
        config.interpreter = "bin/python".to_string();
        config
    }

    #[tokio::test]
    async fn test_missing_environment_fails_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let bootstrapper = RunBootstrapper::new(dir.path(), runner_config());

        let err = bootstrapper
            .run(vec!["--dry-run".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::EnvironmentMissing { .. }));
        // Nothing ran, so no log was created
        assert!(!bootstrapper.log_path().exists());
    }

    #[cfg(unix)]
    fn install_fake_interpreter(base: &Path, script_body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = base.join("venv/bin");
        std::fs::create_dir_all(&bin_dir).unwrap();
        let interpreter = bin_dir.join("python");
        std::fs::write(&interpreter, format!("#!/bin/sh\n{script_body}\n")).unwrap();
        std::fs::set_permissions(&interpreter, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exit_code_mirrors_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_interpreter(dir.path(), "exit 2");
        let bootstrapper = RunBootstrapper::new(dir.path(), runner_config());

        let code = bootstrapper.run(Vec::new()).await.unwrap();
        assert_eq!(code, 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_arguments_pass_through_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        // The fake interpreter prints its argv after the -m <module> prefix
        install_fake_interpreter(dir.path(), "shift 2; echo \"$@\"");
        let bootstrapper = RunBootstrapper::new(dir.path(), runner_config());

        let code = bootstrapper
            .run(vec!["--dry-run".to_string(), "--stats".to_string()])
            .await
            .unwrap();
        assert_eq!(code, 0);

        let log = std::fs::read_to_string(bootstrapper.log_path()).unwrap();
        assert_eq!(log.trim(), "--dry-run --stats");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_log_appends_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        install_fake_interpreter(dir.path(), "echo run-$3");
        let bootstrapper = RunBootstrapper::new(dir.path(), runner_config());

        bootstrapper.run(vec!["one".to_string()]).await.unwrap();
        bootstrapper.run(vec!["two".to_string()]).await.unwrap();

        let log = std::fs::read_to_string(bootstrapper.log_path()).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines, vec!["run-one", "run-two"]);
    }
}
