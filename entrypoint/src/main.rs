// Container entrypoint binary
//
// Applies pending schema migrations, then starts the HTTP service. A failed
// migration is fatal: the service is never spawned and the container exits
// non-zero for the orchestrator to handle.

use common::bootstrap;
use common::config::Settings;
use common::entrypoint::ContainerEntrypoint;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    bootstrap::init_json_tracing(&settings.observability.log_level);

    if let Err(e) = settings.validate() {
        error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    }

    let entrypoint = ContainerEntrypoint::from_env(settings.entrypoint);
    info!(
        port = entrypoint.port(),
        upload_dir = %entrypoint.upload_dir(),
        "Container entrypoint starting"
    );

    match entrypoint.start().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "Container startup failed");
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
