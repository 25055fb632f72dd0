//! dual-pool - command line entry point.
//!
//! Opens the configured backend, optionally runs one query, prints the result
//! and a health report as JSON, then closes the pool.

use clap::Parser;
use dual_pool::Pool;
use dual_pool::config::{Config, StoreConfig};
use dual_pool::models::{QueryParam, masked_connection_string};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so stdout stays valid JSON
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Loggable description of the backend target.
fn describe_target(config: &StoreConfig) -> String {
    match config.networked_url() {
        Some(url) => masked_connection_string(url),
        None => config.sqlite_path.display().to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    let store_config = config.store_config();
    info!(
        mode = %store_config.mode(),
        target = %describe_target(&store_config),
        "Starting dual-pool v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = Pool::open(&store_config).await?;

    let outcome = match &config.query {
        Some(sql) => {
            let params: Vec<QueryParam> = config
                .params
                .iter()
                .map(|raw| QueryParam::parse_cli(raw))
                .collect();
            pool.query(sql, &params).await.map(Some)
        }
        None => Ok(None),
    };

    let result = match outcome {
        Ok(Some(result)) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            error!(error = %e, code = ?e.code(), "Query failed");
            Err(e)
        }
    };

    let health = pool.health_check().await;
    println!("{}", serde_json::to_string_pretty(&health)?);

    pool.end().await;
    info!("Shutdown complete");

    result.map_err(Into::into)
}
