//! Reverse-proxy load balancer
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!  Client ───────▶│ proxy listener → dispatcher → target pool    │──▶ Targets
//!                 │                       ▲             ▲        │
//!  Operator ─────▶│ admin listener ───────┘   health probe       │
//!                 │        │                                     │
//!                 │        └──▶ config file (persisted pool)     │
//!                 └──────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use lb_proxy::lifecycle::{launch, signals::wait_for_signal, Shutdown};
use lb_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "lb-proxy")]
#[command(about = "Reverse-proxy load balancer with active health probing", long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lb-proxy starting");

    let shutdown = Shutdown::new();
    let running = match launch(&args.config, &shutdown).await {
        Ok(running) => running,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::FAILURE;
        }
    };

    wait_for_signal().await;
    tracing::info!("Shutting down");
    shutdown.trigger();
    running.join().await;

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
