use anyhow::Result;
use tracing::{error, info};

mod api;
mod cli;
mod storage;
mod utils;
mod views;

use cli::config::{ConsoleConfig, BASE_URL_ENV};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = cli::parse_args();

    // Verbose sessions keep a debug log even without --log-file
    let log_file = args
        .log_file
        .clone()
        .or_else(|| args.verbose.then(utils::default_log_file));
    utils::init_logging(args.verbose, log_file)?;
    info!("Starting monitor console v{}", env!("CARGO_PKG_VERSION"));

    let config = ConsoleConfig::load_default()?
        .with_overrides(std::env::var(BASE_URL_ENV).ok(), args.base_url.clone());

    // Process commands
    match cli::process_command(args, config).await {
        Ok(_) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            Err(e)
        }
    }
}
