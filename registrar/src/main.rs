// Registrar binary entry point
//
// Installs, removes, or inspects the recurring scheduled task that fires the
// run bootstrapper. Cadence and logon mode are explicit configuration inputs
// to a single registration operation; install always replaces an existing
// registration under the same name.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use common::bootstrap;
use common::config::{Settings, TaskConfig};
use common::registrar::schtasks::SchtasksStore;
use common::registrar::{DeleteOutcome, LogonMode, Registrar, TaskDescriptor, TaskStore};
use common::schedule::{parse_timezone, parse_weekday, Cadence, TimeOfDay};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "setup-task",
    about = "Register the job agent's recurring scheduled task"
)]
struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Register the task, replacing any existing registration with the same name
    Install {
        /// Task name in the host scheduler namespace
        #[arg(long)]
        name: Option<String>,

        #[arg(long, value_enum)]
        cadence: Option<CadenceArg>,

        /// Weekday for weekly cadence (mon, tue, ...)
        #[arg(long)]
        weekday: Option<String>,

        /// Fire time as HH:MM
        #[arg(long)]
        at: Option<String>,

        #[arg(long, value_enum)]
        logon: Option<LogonArg>,

        /// Account the task runs under (defaults to the invoking user)
        #[arg(long)]
        principal: Option<String>,

        /// Target command the scheduler fires (program followed by arguments)
        #[arg(long, num_args = 1.., value_name = "COMMAND")]
        command: Option<Vec<String>>,
    },
    /// Remove the task; succeeds even if it is not registered
    Uninstall {
        #[arg(long)]
        name: Option<String>,
    },
    /// Show whether the task is registered and when it fires next
    Status {
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CadenceArg {
    Daily,
    Weekly,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogonArg {
    /// Credential-less S4U logon; runs without an active session
    S4u,
    /// Plain interactive create-task registration
    Interactive,
}

impl From<LogonArg> for LogonMode {
    fn from(arg: LogonArg) -> Self {
        match arg {
            LogonArg::S4u => LogonMode::ServiceForUser,
            LogonArg::Interactive => LogonMode::Interactive,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match Settings::load_from_path(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    bootstrap::init_human_tracing(&settings.observability.log_level);

    if let Err(e) = settings.validate() {
        error!(error = %e, "Invalid configuration");
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }
    bootstrap::log_config_warnings(&settings);

    let store = Arc::new(SchtasksStore::new()) as Arc<dyn TaskStore>;
    let registrar = Registrar::new(store);

    if let Err(e) = dispatch(&registrar, &settings, cli.command).await {
        error!(error = %e, "Task registration command failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn dispatch(registrar: &Registrar, settings: &Settings, command: CliCommand) -> Result<()> {
    match command {
        CliCommand::Install {
            name,
            cadence,
            weekday,
            at,
            logon,
            principal,
            command,
        } => {
            let descriptor = build_descriptor(
                &settings.task,
                name,
                cadence,
                weekday,
                at,
                logon,
                principal,
                command,
            )?;
            registrar
                .register(&descriptor)
                .await
                .context("Failed to register task")?;
            print_confirmation(&descriptor);
            Ok(())
        }
        CliCommand::Uninstall { name } => {
            let name = name.unwrap_or_else(|| settings.task.name.clone());
            let outcome = registrar
                .unregister(&name)
                .await
                .context("Failed to unregister task")?;
            match outcome {
                DeleteOutcome::Deleted => println!("Task '{name}' removed."),
                DeleteOutcome::NotFound => {
                    println!("Task '{name}' was not registered; nothing to remove.")
                }
            }
            Ok(())
        }
        CliCommand::Status { name } => {
            let name = name.unwrap_or_else(|| settings.task.name.clone());
            let timezone = parse_timezone(&settings.task.timezone)?;
            let status = registrar
                .status(&name, &settings.task.cadence, timezone, Utc::now())
                .await
                .context("Failed to query task status")?;

            if status.registered {
                println!("Task '{name}' is registered ({}).", settings.task.cadence);
                if let Some(next) = status.next_fire {
                    println!(
                        "Next fire: {} ({})",
                        next.with_timezone(&timezone),
                        settings.task.timezone
                    );
                }
            } else {
                println!("Task '{name}' is not registered.");
            }
            Ok(())
        }
    }
}

/// Merge CLI overrides onto the configured task settings
#[allow(clippy::too_many_arguments)]
fn build_descriptor(
    task: &TaskConfig,
    name: Option<String>,
    cadence: Option<CadenceArg>,
    weekday: Option<String>,
    at: Option<String>,
    logon: Option<LogonArg>,
    principal: Option<String>,
    command: Option<Vec<String>>,
) -> Result<TaskDescriptor> {
    let at: TimeOfDay = match at {
        Some(raw) => raw.parse()?,
        None => task.cadence.time_of_day(),
    };

    let cadence = match (cadence, &task.cadence) {
        (Some(CadenceArg::Daily), _) => Cadence::Daily { at },
        (Some(CadenceArg::Weekly), configured) => {
            let weekday = match (&weekday, configured) {
                (Some(raw), _) => parse_weekday(raw)?,
                (None, Cadence::Weekly { weekday, .. }) => *weekday,
                (None, Cadence::Daily { .. }) => anyhow::bail!(
                    "Weekly cadence needs --weekday (configured cadence is daily)"
                ),
            };
            Cadence::Weekly { weekday, at }
        }
        (None, Cadence::Daily { .. }) => Cadence::Daily { at },
        (None, Cadence::Weekly { weekday: wd, .. }) => {
            let weekday = match &weekday {
                Some(raw) => parse_weekday(raw)?,
                None => *wd,
            };
            Cadence::Weekly { weekday, at }
        }
    };

    Ok(TaskDescriptor {
        name: name.unwrap_or_else(|| task.name.clone()),
        cadence,
        command: command.unwrap_or_else(|| task.command.clone()),
        principal: principal.or_else(|| task.principal.clone()),
        logon: logon.map(Into::into).unwrap_or(task.logon),
        resilience: task.resilience,
    })
}

/// Confirmation summarizing the effective schedule, plus operator hints
fn print_confirmation(descriptor: &TaskDescriptor) {
    print!("{}", confirmation_summary(descriptor));
}

/// Interactive registrations go through `schtasks /Create`, which cannot
/// apply the resilience settings bundle; the summary only lists the flags
/// when they actually take effect (the S4U path).
fn confirmation_summary(descriptor: &TaskDescriptor) -> String {
    let mut summary = format!(
        "Task '{}' registered: {}\n",
        descriptor.name, descriptor.cadence
    );
    summary.push_str(&format!(
        "  logon: {}, principal: {}\n",
        match descriptor.logon {
            LogonMode::ServiceForUser => "S4U (no stored password)",
            LogonMode::Interactive => "interactive",
        },
        descriptor.principal.as_deref().unwrap_or("<invoking user>")
    ));
    match descriptor.logon {
        LogonMode::ServiceForUser => {
            let flags = &descriptor.resilience;
            summary.push_str(&format!(
                "  resilience: run_if_missed={}, wake_to_run={}, allow_on_battery={}, dont_stop_on_battery_switch={}\n",
                flags.run_if_missed, flags.wake_to_run, flags.allow_on_battery, flags.dont_stop_on_battery_switch
            ));
        }
        LogonMode::Interactive => {
            summary.push_str("  resilience: not applied (interactive registration cannot set the settings bundle)\n");
        }
    }
    summary.push('\n');
    summary.push_str(&format!("Verify:  schtasks /Query /TN {}\n", descriptor.name));
    summary.push_str(&format!("Run now: schtasks /Run /TN {}\n", descriptor.name));
    summary.push_str(&format!("Delete:  schtasks /Delete /TN {} /F\n", descriptor.name));
    summary
}
