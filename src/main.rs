//! ttlcache - workload driver
//!
//! Hammers a shared TTL cache with concurrent stores, loads and deletes,
//! logging statistics as it goes and printing a JSON report at the end.

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttlcache::workload::{run_workload, WorkloadReport};
use ttlcache::{spawn_stats_reporter, Config, TtlCache};

/// Main entry point for the workload driver.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and start the stats reporter
/// 4. Run the workload until it finishes or a shutdown signal arrives
/// 5. Print the final report as JSON
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttlcache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ttlcache workload driver");

    let config = Config::from_env();
    info!(
        "Configuration loaded: workers={}, key_space={}, entry_ttl={}ms, run={}s, report_interval={}s",
        config.workers, config.key_space, config.entry_ttl_ms, config.run_secs, config.report_interval
    );

    let cache: TtlCache<u64, u64> = TtlCache::new();
    let reporter = spawn_stats_reporter(cache.clone(), config.report_interval);

    // Dropping the workload future on shutdown aborts its workers
    let operations = tokio::select! {
        operations = run_workload(cache.clone(), &config) => Some(operations),
        _ = shutdown_signal() => None,
    };

    reporter.abort();
    if operations.is_none() {
        warn!("Workload interrupted");
    }

    let report = WorkloadReport::new(&config, operations, cache.stats());
    println!("{}", serde_json::to_string_pretty(&report)?);

    cache.clear();
    info!("Shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
