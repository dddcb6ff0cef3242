//! Tale key pool CLI
//!
//! Inspects the API key pool configured for video generation.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tale_key_pool::{config::Settings, ApiKeyPool, KeyStatus};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Tale key pool
///
/// Shows the rotation state and quota of configured API keys.
#[derive(Parser, Debug)]
#[command(name = "tale-keys")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Env file to load instead of ./.env and the process environment
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print per-key usage, concurrency and health
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and print a summary
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = match &args.env_file {
        Some(path) => Settings::from_env_file(path)?,
        None => Settings::load()?,
    };

    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }

    init_tracing(&settings.log_level, args.json_logs);

    tracing::debug!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        "Settings loaded"
    );

    let pool = settings.build_pool()?;

    match args.command {
        Command::Status { json } => {
            let status = pool.get_status();
            if json {
                let report = serde_json::json!({
                    "strategy": pool.strategy(),
                    "daily_limit": pool.daily_limit(),
                    "total_remaining": pool.get_total_remaining(),
                    "keys": status,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_status(&pool, &status);
            }
        }
        Command::Check => {
            let config = pool.config();
            println!("Configuration OK");
            println!("  keys:            {}", pool.len());
            println!("  strategy:        {}", config.strategy);
            println!("  daily limit:     {}", config.daily_limit);
            println!("  max concurrent:  {}", config.max_concurrent_per_key);
            println!("  max failures:    {}", config.max_failures_per_key);
            println!("  location:        {}", settings.google_location);
            if let Some(project) = &settings.google_project_id {
                println!("  default project: {}", project);
            }
        }
    }

    Ok(())
}

fn print_status(pool: &ApiKeyPool, status: &[KeyStatus]) {
    println!(
        "{:<16} {:<14} {:>6} {:>9} {:>7} {:>8}  {}",
        "ALIAS", "KEY", "USED", "REMAINING", "ACTIVE", "FAILURES", "HEALTH"
    );
    for key in status {
        println!(
            "{:<16} {:<14} {:>6} {:>9} {:>7} {:>8}  {}",
            key.alias,
            key.key_preview,
            key.used,
            key.remaining,
            key.active_concurrent,
            key.failure_count,
            if key.healthy { "ok" } else { "disabled" }
        );
    }
    println!();
    println!("Total remaining: {}", pool.get_total_remaining());
    println!("Strategy:        {}", pool.strategy());
}

/// Initialize tracing subscriber with the specified log level
///
/// Logs go to stderr so that status output on stdout stays parseable.
fn init_tracing(log_level: &str, json: bool) {
    // Build filter from RUST_LOG env var or use provided log level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let console_layer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    };

    tracing_subscriber::registry().with(console_layer).init();
}
