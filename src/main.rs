//! tsdb-link - writes a payload to a time-series backend and keeps the
//! connection alive while it is delivered.

use clap::Parser;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tsdb_link::{Args, ConnectionPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("tsdb_link={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("Target: {}", args.target);
    info!("Connect delay: {}ms", args.connect_delay_ms);
    info!("Write timeout: {}ms", args.write_timeout_ms);

    let pool = ConnectionPool::new(args.target.clone(), args.connection_config())?;
    pool.write(&args.source, args.payload.clone().into_bytes()).await;
    info!(source = %args.source, bytes = args.payload.len(), "Payload queued");

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.linger_secs)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    for status in pool.statuses() {
        info!(
            source = %status.source,
            state = %status.state,
            pending = status.pending,
            written = status.metrics.payloads_written,
            dial_failures = status.metrics.dial_failures,
            "Connection status"
        );
    }
    pool.shutdown().await;

    Ok(())
}
