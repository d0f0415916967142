//! Seqwire client binary.
//!
//! Thin glue: parse arguments, initialize logging, wire Ctrl-C to the
//! cooperative shutdown signal, map the receiver outcome to an exit code.

use std::process::ExitCode;

use clap::Parser;
use rand::RngCore;
use seqwire_client::{ClientError, Outcome, receiver};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Receive, acknowledge, and verify one series of u32 values.
#[derive(Debug, Parser)]
#[command(name = "seqwire-client")]
struct Args {
    /// Server port to connect to.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Length of the series to request.
    #[arg(short, long, default_value_t = 10)]
    n: u32,

    /// Client identity. Random each run unless set; pass a stable id to
    /// resume an interrupted delivery.
    #[arg(long, default_value_t = random_id())]
    id: String,
}

fn random_id() -> String {
    let mut raw = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut raw);
    hex::encode(raw)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let addr = format!("127.0.0.1:{}", args.port);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    match receiver::run(&addr, args.n, &args.id, &std::env::temp_dir(), shutdown_rx).await {
        Ok(Outcome::Verified) => ExitCode::SUCCESS,
        Ok(Outcome::Interrupted) => {
            info!(id = %args.id, "interrupted, progress saved");
            ExitCode::SUCCESS
        },
        Err(err @ ClientError::ChecksumMismatch { .. }) => {
            error!(error = %err, "series failed verification");
            ExitCode::FAILURE
        },
        Err(err) => {
            error!(error = %err, "client failed");
            ExitCode::FAILURE
        },
    }
}
