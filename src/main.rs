//! Study assistant service entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config (`-f <PATH>` or `config/default.toml`)
//!   3. Init logger once
//!   4. Select storage and generation providers
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Serve HTTP until shutdown

use study_assistant::{bootstrap, config, error::AppError, logger};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present; errors are ignored (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_cli_args();
    let config = config::load(args.config_path.as_deref())?;

    logger::init(&config.server.log_level, config.server.force_log_level, config.server.log_format)?;

    info!(
        name = %config.server.name,
        bind = %config.server.bind,
        log_level = %config.server.log_level,
        log_level_forced = config.server.force_log_level,
        mock_mode = config.server.mock_mode,
        data_file = %config.storage.file.display(),
        "config loaded"
    );

    let assistant = bootstrap::assistant(&config);

    // Ctrl-C handler cancels the token so the server drains and exits.
    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    #[cfg(feature = "http")]
    study_assistant::http::serve(&config.server, assistant, shutdown).await?;

    #[cfg(not(feature = "http"))]
    {
        let _ = assistant;
        info!("built without the http feature; waiting for ctrl-c");
        shutdown.cancelled().await;
    }

    info!("shutdown complete");
    Ok(())
}

struct CliArgs {
    config_path: Option<String>,
}

fn parse_cli_args() -> CliArgs {
    let mut config_path = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: study-assistant [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                if let Some(path) = iter.next() {
                    config_path = Some(path);
                } else {
                    eprintln!("error: -f/--config requires a path argument");
                    std::process::exit(1);
                }
            }
            _ => {}
        }
    }

    CliArgs { config_path }
}
