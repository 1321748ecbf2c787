//! Fleet Health Sentinel Binary

use clap::{Parser, Subcommand};
use health_sentinel::{load_endpoints, Config, HealthMonitor, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(version, about = "Probe service health endpoints and send deduplicated alerts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single cycle and print the result as JSON
    Check,
    /// Run a cycle every SCAN_INTERVAL_SECONDS until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    initialize_tracing();

    let cli = Cli::parse();

    info!("Starting health sentinel v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    let endpoints = load_endpoints(&config.services_file)?;
    info!(
        "Loaded {} endpoints from {} (KV: {}, Teams: {})",
        endpoints.len(),
        config.services_file,
        config.has_kv(),
        config.teams_webhook_url.is_some()
    );

    let monitor = HealthMonitor::new(config, endpoints)?;

    match cli.command {
        Command::Check => {
            let result = monitor.run_cycle().await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Watch => {
            if let Err(e) = monitor.watch().await {
                error!("Health monitor failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Initialize structured logging
fn initialize_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .json();

    let filter_layer = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
