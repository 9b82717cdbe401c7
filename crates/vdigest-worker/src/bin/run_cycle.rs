//! Run a single dispatch cycle now and print the report as JSON.
//!
//! Usage: `run-cycle [--recover-only]`

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use vdigest_worker::{Dispatcher, DispatcherConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vdigest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let recover_only = std::env::args().skip(1).any(|arg| arg == "--recover-only");

    let dispatcher = Dispatcher::from_env(DispatcherConfig::from_env()).await?;

    if recover_only {
        let released = dispatcher.recover_stranded(Utc::now()).await?;
        println!("{}", serde_json::json!({ "recovered": released }));
        return Ok(());
    }

    let report = dispatcher.run_cycle(Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
