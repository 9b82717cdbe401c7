//! Daily summarization dispatcher daemon.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vdigest_worker::{metrics, Dispatcher, DispatcherConfig, Scheduler};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vdigest=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .with(env_filter)
            .init();
    }

    // Install rustls crypto provider before any TLS connection (Redis or HTTPS)
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting vdigest-worker");

    let config = DispatcherConfig::from_env();
    info!("Dispatcher config: {:?}", config);

    let schedule = match config.schedule() {
        Ok(s) => s,
        Err(e) => {
            error!("Invalid schedule: {}", e);
            std::process::exit(1);
        }
    };
    let run_on_start = config.run_on_start;

    if let Some(port) = std::env::var("METRICS_PORT").ok().and_then(|s| s.parse::<u16>().ok()) {
        match metrics::install_exporter(port) {
            Ok(()) => info!("Serving metrics on port {}", port),
            Err(e) => warn!("Metrics disabled: {}", e),
        }
    }

    let dispatcher = match Dispatcher::from_env(config).await {
        Ok(d) => Arc::new(d),
        Err(e) => {
            error!("Failed to create dispatcher: {}", e);
            std::process::exit(1);
        }
    };

    let scheduler = Arc::new(Scheduler::new(dispatcher, schedule, run_on_start));

    let signal_scheduler = scheduler.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        signal_scheduler.shutdown();
    });

    scheduler.run().await;

    info!("Worker shutdown complete");
}
