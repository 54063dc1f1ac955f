// Host scheduler task store backed by schtasks / PowerShell
//
// Interactive registrations go through `schtasks /Create`; S4U registrations
// need the ScheduledTasks cmdlets because schtasks cannot express a
// credential-less logon. Command rendering is kept pure so the argument
// mapping is testable without a host scheduler.

use super::{DeleteOutcome, LogonMode, TaskDescriptor, TaskStore};
use crate::errors::RegistrarError;
use crate::schedule::{weekday_token, Cadence};
use async_trait::async_trait;
use chrono::Weekday;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

/// Task store that shells out to the host scheduler CLI
#[derive(Debug, Default)]
pub struct SchtasksStore;

impl SchtasksStore {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, program: &str, args: &[String]) -> Result<Output, RegistrarError> {
        debug!(program = %program, ?args, "Invoking host scheduler CLI");
        Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    RegistrarError::PermissionDenied(e.to_string())
                }
                _ => RegistrarError::StoreUnavailable {
                    program: program.to_string(),
                    source: e,
                },
            })
    }
}

#[async_trait]
impl TaskStore for SchtasksStore {
    async fn create(&self, descriptor: &TaskDescriptor) -> Result<(), RegistrarError> {
        let (program, args) = create_command(descriptor);
        let output = self.run(&program, &args).await?;
        if output.status.success() {
            return Ok(());
        }
        Err(failure_from_output(&output))
    }

    async fn delete(&self, name: &str) -> Result<DeleteOutcome, RegistrarError> {
        let args = delete_args(name);
        let output = self.run("schtasks", &args).await?;
        if output.status.success() {
            return Ok(DeleteOutcome::Deleted);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found(&stderr) {
            return Ok(DeleteOutcome::NotFound);
        }
        Err(failure_from_output(&output))
    }

    async fn exists(&self, name: &str) -> Result<bool, RegistrarError> {
        let args = query_args(name);
        let output = self.run("schtasks", &args).await?;
        if output.status.success() {
            return Ok(true);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_not_found(&stderr) {
            return Ok(false);
        }
        Err(failure_from_output(&output))
    }
}

/// Render the create invocation for a descriptor
pub fn create_command(descriptor: &TaskDescriptor) -> (String, Vec<String>) {
    match descriptor.logon {
        LogonMode::Interactive => ("schtasks".to_string(), schtasks_create_args(descriptor)),
        LogonMode::ServiceForUser => (
            "powershell".to_string(),
            vec![
                "-NoProfile".to_string(),
                "-NonInteractive".to_string(),
                "-Command".to_string(),
                s4u_register_script(descriptor),
            ],
        ),
    }
}

/// `schtasks /Delete` arguments; /F suppresses the confirmation prompt
pub fn delete_args(name: &str) -> Vec<String> {
    vec![
        "/Delete".to_string(),
        "/TN".to_string(),
        name.to_string(),
        "/F".to_string(),
    ]
}

pub fn query_args(name: &str) -> Vec<String> {
    vec!["/Query".to_string(), "/TN".to_string(), name.to_string()]
}

/// `schtasks /Create` arguments for an interactive registration.
///
/// The declarative create call cannot express the resilience settings bundle;
/// those require the S4U path.
pub fn schtasks_create_args(descriptor: &TaskDescriptor) -> Vec<String> {
    let mut args = vec![
        "/Create".to_string(),
        "/TN".to_string(),
        descriptor.name.clone(),
        "/TR".to_string(),
        render_target(&descriptor.command),
    ];

    match &descriptor.cadence {
        Cadence::Daily { at } => {
            args.push("/SC".to_string());
            args.push("DAILY".to_string());
            args.push("/ST".to_string());
            args.push(at.to_string());
        }
        Cadence::Weekly { weekday, at } => {
            args.push("/SC".to_string());
            args.push("WEEKLY".to_string());
            args.push("/D".to_string());
            args.push(weekday_token(*weekday).to_string());
            args.push("/ST".to_string());
            args.push(at.to_string());
        }
    }

    if let Some(principal) = &descriptor.principal {
        args.push("/RU".to_string());
        args.push(principal.clone());
    }

    args.push("/RL".to_string());
    args.push("HIGHEST".to_string());
    // Overwrite silently if a task with the same name still exists
    args.push("/F".to_string());
    args
}

/// PowerShell script registering the task with an S4U principal
pub fn s4u_register_script(descriptor: &TaskDescriptor) -> String {
    let (program, arguments) = split_target(&descriptor.command);

    let action = if arguments.is_empty() {
        format!("New-ScheduledTaskAction -Execute '{}'", ps_quote(&program))
    } else {
        format!(
            "New-ScheduledTaskAction -Execute '{}' -Argument '{}'",
            ps_quote(&program),
            ps_quote(&arguments)
        )
    };

    let trigger = match &descriptor.cadence {
        Cadence::Daily { at } => format!("New-ScheduledTaskTrigger -Daily -At {at}"),
        Cadence::Weekly { weekday, at } => format!(
            "New-ScheduledTaskTrigger -Weekly -DaysOfWeek {} -At {at}",
            full_weekday_name(*weekday)
        ),
    };

    let user = match &descriptor.principal {
        Some(principal) => format!("'{}'", ps_quote(principal)),
        None => "$env:USERNAME".to_string(),
    };
    let principal = format!(
        "New-ScheduledTaskPrincipal -UserId {user} -LogonType S4U -RunLevel Highest"
    );

    let mut settings = "New-ScheduledTaskSettingsSet".to_string();
    let flags = &descriptor.resilience;
    if flags.run_if_missed {
        settings.push_str(" -StartWhenAvailable");
    }
    if flags.wake_to_run {
        settings.push_str(" -WakeToRun");
    }
    if flags.allow_on_battery {
        settings.push_str(" -AllowStartIfOnBatteries");
    }
    if flags.dont_stop_on_battery_switch {
        settings.push_str(" -DontStopIfGoingOnBatteries");
    }

    format!(
        "$action = {action}; \
         $trigger = {trigger}; \
         $principal = {principal}; \
         $settings = {settings}; \
         Register-ScheduledTask -TaskName '{name}' -Action $action -Trigger $trigger \
         -Principal $principal -Settings $settings -Force | Out-Null",
        name = ps_quote(&descriptor.name)
    )
}

/// Join a command vector into a single scheduler action string
pub fn render_target(command: &[String]) -> String {
    command
        .iter()
        .map(|arg| {
            if arg.contains(' ') {
                format!("\"{arg}\"")
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_target(command: &[String]) -> (String, String) {
    let program = command.first().cloned().unwrap_or_default();
    let arguments = render_target(&command[1.min(command.len())..]);
    (program, arguments)
}

/// Escape for a single-quoted PowerShell string literal
fn ps_quote(value: &str) -> String {
    value.replace('\'', "''")
}

fn full_weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// schtasks reports a missing task as a file-not-found style error
fn is_not_found(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("cannot find") || lower.contains("does not exist")
}

fn failure_from_output(output: &Output) -> RegistrarError {
    classify_failure(
        output.status.code().unwrap_or(-1),
        &String::from_utf8_lossy(&output.stderr),
    )
}

/// Map a failed scheduler CLI invocation onto the error taxonomy: a denied
/// registration is operator-actionable (re-run elevated), everything else is
/// an opaque store failure carrying the exit status.
fn classify_failure(status: i32, stderr: &str) -> RegistrarError {
    let stderr = stderr.trim().to_string();
    if stderr.to_lowercase().contains("denied") {
        return RegistrarError::PermissionDenied(stderr);
    }
    RegistrarError::StoreCommandFailed { status, stderr }
}
