// Task registration against the host scheduler
//
// Registration is a compensating two-step: unconditionally delete any existing
// task with the same name (tolerating "not found"), then create the new one.
// The host scheduler's task store has no transactional isolation, so this is
// how re-registration stays idempotent without read-modify-write.

pub mod schtasks;

use crate::errors::RegistrarError;
use crate::schedule::Cadence;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// How the task authenticates when the scheduler fires it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogonMode {
    /// S4U logon: runs without a stored password or an active user session
    ServiceForUser,
    /// Plain interactive registration via the scheduler's create-task call
    Interactive,
}

/// Resilience settings applied to the registered task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResilienceFlags {
    /// Fire as soon as possible after a missed window
    pub run_if_missed: bool,
    /// Wake the machine to run the task
    pub wake_to_run: bool,
    /// Allow the task to start on battery power
    pub allow_on_battery: bool,
    /// Keep running when the machine switches to battery
    pub dont_stop_on_battery_switch: bool,
}

impl Default for ResilienceFlags {
    fn default() -> Self {
        Self {
            run_if_missed: true,
            wake_to_run: true,
            allow_on_battery: true,
            dont_stop_on_battery_switch: true,
        }
    }
}

/// The host scheduler's persisted record of a recurring job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub name: String,
    pub cadence: Cadence,
    /// Program followed by arguments
    pub command: Vec<String>,
    /// Account the task runs under; None means the invoking user
    pub principal: Option<String>,
    pub logon: LogonMode,
    pub resilience: ResilienceFlags,
}

impl TaskDescriptor {
    pub fn validate(&self) -> Result<(), RegistrarError> {
        if self.name.trim().is_empty() {
            return Err(RegistrarError::InvalidDescriptor(
                "task name cannot be empty".to_string(),
            ));
        }
        if self.command.is_empty() || self.command[0].trim().is_empty() {
            return Err(RegistrarError::InvalidDescriptor(
                "task command cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of a delete attempt against the task store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// TaskStore abstracts the host scheduler's task registry
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create a new task. The caller guarantees no task with this name exists.
    async fn create(&self, descriptor: &TaskDescriptor) -> Result<(), RegistrarError>;

    /// Delete a task by name. "Not found" is an outcome, not an error.
    async fn delete(&self, name: &str) -> Result<DeleteOutcome, RegistrarError>;

    /// Whether a task with this name is currently registered
    async fn exists(&self, name: &str) -> Result<bool, RegistrarError>;
}

/// Registration status for a task name
#[derive(Debug, Clone, PartialEq)]
pub struct TaskStatus {
    pub name: String,
    pub registered: bool,
    /// Next fire time per the configured cadence, when registered
    pub next_fire: Option<DateTime<Utc>>,
}

/// Registrar performs idempotent install and tolerant uninstall of the task
pub struct Registrar {
    store: Arc<dyn TaskStore>,
}

impl Registrar {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self { store }
    }

    /// Install the task, replacing any existing registration under the same name
    #[tracing::instrument(skip(self, descriptor), fields(task = %descriptor.name))]
    pub async fn register(&self, descriptor: &TaskDescriptor) -> Result<(), RegistrarError> {
        descriptor.validate()?;

        match self.store.delete(&descriptor.name).await? {
            DeleteOutcome::Deleted => {
                debug!(task = %descriptor.name, "Removed existing registration before re-install")
            }
            DeleteOutcome::NotFound => {}
        }

        self.store.create(descriptor).await?;
        info!(
            task = %descriptor.name,
            cadence = %descriptor.cadence,
            logon = ?descriptor.logon,
            "Task registered"
        );
        Ok(())
    }

    /// Remove the task. Succeeds whether or not the task exists.
    #[tracing::instrument(skip(self))]
    pub async fn unregister(&self, name: &str) -> Result<DeleteOutcome, RegistrarError> {
        let outcome = self.store.delete(name).await?;
        match outcome {
            DeleteOutcome::Deleted => info!(task = %name, "Task unregistered"),
            DeleteOutcome::NotFound => {
                debug!(task = %name, "Task was not registered; nothing to remove")
            }
        }
        Ok(outcome)
    }

    /// Report whether the task is registered and when it fires next
    pub async fn status(
        &self,
        name: &str,
        cadence: &Cadence,
        timezone: Tz,
        now: DateTime<Utc>,
    ) -> Result<TaskStatus, RegistrarError> {
        let registered = self.store.exists(name).await?;
        let next_fire = if registered {
            Some(cadence.next_fire_after(timezone, now)?)
        } else {
            None
        };
        Ok(TaskStatus {
            name: name.to_string(),
            registered,
            next_fire,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::TimeOfDay;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    struct InMemoryStore {
        tasks: Mutex<HashMap<String, TaskDescriptor>>,
    }

    impl InMemoryStore {
        fn new() -> Self {
            Self {
                tasks: Mutex::new(HashMap::new()),
            }
        }
    }

    #[async_trait]
    impl TaskStore for InMemoryStore {
        async fn create(&self, descriptor: &TaskDescriptor) -> Result<(), RegistrarError> {
            self.tasks
                .lock()
                .await
                .insert(descriptor.name.clone(), descriptor.clone());
            Ok(())
        }

        async fn delete(&self, name: &str) -> Result<DeleteOutcome, RegistrarError> {
            match self.tasks.lock().await.remove(name) {
                Some(_) => Ok(DeleteOutcome::Deleted),
                None => Ok(DeleteOutcome::NotFound),
            }
        }

        async fn exists(&self, name: &str) -> Result<bool, RegistrarError> {
            Ok(self.tasks.lock().await.contains_key(name))
        }
    }

    fn descriptor(name: &str) -> TaskDescriptor {
        TaskDescriptor {
            name: name.to_string(),
            cadence: Cadence::Daily {
                at: TimeOfDay { hour: 8, minute: 0 },
            },
            command: vec!["run-agent".to_string()],
            principal: None,
            logon: LogonMode::Interactive,
            resilience: ResilienceFlags::default(),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_empty_name() {
        let registrar = Registrar::new(Arc::new(InMemoryStore::new()));
        let mut d = descriptor("x");
        d.name = String::new();
        assert!(matches!(
            registrar.register(&d).await,
            Err(RegistrarError::InvalidDescriptor(_))
        ));
    }

    #[tokio::test]
    async fn test_unregister_missing_task_is_ok() {
        let registrar = Registrar::new(Arc::new(InMemoryStore::new()));
        let outcome = registrar.unregister("NoSuchTask").await.unwrap();
        assert_eq!(outcome, DeleteOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_status_of_unregistered_task_has_no_next_fire() {
        let registrar = Registrar::new(Arc::new(InMemoryStore::new()));
        let cadence = Cadence::Daily {
            at: TimeOfDay { hour: 8, minute: 0 },
        };
        let status = registrar
            .status("NoSuchTask", &cadence, chrono_tz::UTC, Utc::now())
            .await
            .unwrap();
        assert!(!status.registered);
        assert!(status.next_fire.is_none());
    }

    #[tokio::test]
    async fn test_status_of_registered_task_reports_next_fire() {
        let store = Arc::new(InMemoryStore::new());
        let registrar = Registrar::new(store);
        let d = descriptor("StatusTask");
        registrar.register(&d).await.unwrap();

        let now = Utc::now();
        let status = registrar
            .status("StatusTask", &d.cadence, chrono_tz::UTC, now)
            .await
            .unwrap();
        assert!(status.registered);
        assert!(status.next_fire.unwrap() > now);
    }
}
