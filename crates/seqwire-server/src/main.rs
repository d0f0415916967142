//! Seqwire server binary.
//!
//! Thin glue: parse arguments, initialize logging, run the registry until the
//! process is terminated externally.

use std::{process::ExitCode, time::Duration};

use clap::Parser;
use seqwire_server::{Registry, RegistryConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Serve per-client u32 series with acked, resumable delivery.
#[derive(Debug, Parser)]
#[command(name = "seqwire-server")]
struct Args {
    /// Port to listen on (loopback only).
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Scheduler tick period in milliseconds.
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let addr = format!("127.0.0.1:{}", args.port);
    let config = RegistryConfig { tick_period: Duration::from_millis(args.tick_ms) };

    let registry = match Registry::bind(&addr, config).await {
        Ok(registry) => registry,
        Err(err) => {
            error!(%addr, error = %err, "failed to start");
            return ExitCode::FAILURE;
        },
    };

    info!(%addr, "listening");

    if let Err(err) = registry.run().await {
        error!(error = %err, "registry failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
