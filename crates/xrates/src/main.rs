//! Standalone pricing service binary

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xrates::RateServer;

#[derive(Parser, Debug)]
#[clap(name = "xrates-service")]
#[clap(about = "Exchange-rate responder for the wallet ledger")]
struct Args {
    /// Bind address for the pricing HTTP server
    #[clap(long, default_value = "0.0.0.0:8085", env = "XR_BIND_ADDR")]
    bind_addr: SocketAddr,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, default_value = "info", env = "LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenv().ok();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("xrates={}", args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = RateServer::new(args.bind_addr);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_task = tokio::spawn(server.run(shutdown_rx));

    tokio::select! {
        result = &mut server_task => {
            result??;
            anyhow::bail!("xr server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
            let _ = server_task.await;
        }
    }

    tracing::info!("xr service stopped");
    Ok(())
}

/// Resolves on SIGINT, SIGTERM or SIGQUIT.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
        _ = quit.recv() => {}
    }
}
