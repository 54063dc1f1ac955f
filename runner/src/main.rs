// Runner binary entry point
//
// Forwards its entire argument vector, unparsed, to the pipeline entry point
// and exits with the pipeline's code. Pipeline output goes to the run log;
// this binary deliberately takes no flags of its own so that flags like
// --dry-run or --stats reach the pipeline verbatim.

use common::bootstrap;
use common::config::Settings;
use common::runner::RunBootstrapper;
use tracing::error;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let settings = match Settings::load() {
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

    let bootstrapper = RunBootstrapper::from_config(settings.runner);
    match bootstrapper.run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "Run bootstrap failed");
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
