// Error handling framework

use thiserror::Error;

/// Schedule-related errors
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid time of day '{value}': {reason}")]
    InvalidTimeOfDay { value: String, reason: String },

    #[error("Invalid weekday: {0}")]
    InvalidWeekday(String),

    #[error("No next fire time available for {cadence} cadence")]
    NoNextFire { cadence: String },
}

/// Task registration errors
#[derive(Error, Debug)]
pub enum RegistrarError {
    #[error("Insufficient privilege to modify the task store: {0}")]
    PermissionDenied(String),

    #[error("Task store command failed with status {status}: {stderr}")]
    StoreCommandFailed { status: i32, stderr: String },

    #[error("Failed to launch task store command '{program}': {source}")]
    StoreUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid task descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Run bootstrapper errors
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(
        "Isolated environment not found at {path}.\n\
         Create it and install dependencies before the next scheduled run:\n\
         python -m venv {env_dir} && {path} -m pip install -r requirements.txt"
    )]
    EnvironmentMissing { path: String, env_dir: String },

    #[error("Failed to open run log at {path}: {source}")]
    LogUnavailable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to launch pipeline interpreter '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Container entrypoint errors
#[derive(Error, Debug)]
pub enum EntrypointError {
    #[error("Migration command is empty")]
    EmptyMigrateCommand,

    #[error("Serve command is empty")]
    EmptyServeCommand,

    #[error("Migration failed with status {0}; service will not start")]
    MigrationFailed(i32),

    #[error("Failed to launch '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_missing_names_remediation() {
        let err = BootstrapError::EnvironmentMissing {
            path: ".venv/bin/python".to_string(),
            env_dir: ".venv".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains(".venv/bin/python"));
        assert!(msg.contains("python -m venv"));
    }

    #[test]
    fn test_migration_failed_display() {
        let err = EntrypointError::MigrationFailed(3);
        assert!(err.to_string().contains("status 3"));
        assert!(err.to_string().contains("will not start"));
    }

    #[test]
    fn test_registrar_error_from_schedule_error() {
        let err: RegistrarError = ScheduleError::InvalidWeekday("funday".to_string()).into();
        assert!(err.to_string().contains("funday"));
    }
}
