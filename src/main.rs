//! Hydra Bridge - Main Entry Point
//!
//! Streams the exchange top-of-book into shared memory and runs shadow
//! execution for the strategy process.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use hydra_bridge::config::load_config;
use hydra_bridge::Bridge;

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Shared region name; overrides the config file
    #[arg(long, env = "HYDRA_SHM_NAME")]
    shm_name: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let mut config = load_config(Some(&args.config))?;
    if let Some(name) = args.shm_name {
        config.channel.name = name;
    }

    // Initialize logging
    let log_level = args
        .log_level
        .unwrap_or_else(|| config.settings.log_level.clone());
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG directives, when set, refine the configured level
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Hydra bridge");
    info!("Configuration file: {}", args.config);
    info!("Market stream: {}", config.feed.url);

    // A channel failure is fatal and exits non-zero
    let bridge = Bridge::new(config).map_err(|e| {
        error!("Startup failed: {}", e);
        e
    })?;
    let mut handle = bridge.start()?;

    let outcome = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Received shutdown signal, cleaning up...");
            None
        }
        err = handle.wait() => Some(err),
    };
    handle.shutdown();

    match outcome {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
