//! Standalone ledger service binary

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use ledger::{
    Archiver, ApiServer, Config, Database, LedgerStore, RemoteRateClient, TokenVerifier,
    WalletService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Grace period for draining in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenv().ok();

    let config = Config::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ledger={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting ledger service");
    tracing::info!("listen address: {}", config.bind_addr);
    tracing::info!("pricing service: {}", config.xr_url);

    ledger::metrics::init_metrics()?;

    let verifier = Arc::new(
        TokenVerifier::from_pem_file(&config.jwt_public_key)
            .context("loading JWT public key")?,
    );

    let db = Database::new(&config.database_url()).await?;
    let store = Arc::new(LedgerStore::new(db));
    let rates = Arc::new(RemoteRateClient::new(config.xr_url.clone()));
    let service = Arc::new(WalletService::new(store.clone(), rates));

    let archiver = Archiver::new(
        store,
        Duration::from_secs(config.archive_period_hours * 3600),
        chrono::Duration::days(config.archive_after_days),
    );

    let server = ApiServer::new(config.bind_addr, service, verifier);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_task = tokio::spawn(server.run(shutdown_rx.clone()));
    let archiver_task = tokio::spawn(archiver.run(shutdown_rx));

    tokio::select! {
        result = &mut server_task => {
            // The server exiting on its own tears down the archiver too.
            let _ = shutdown_tx.send(true);
            let _ = archiver_task.await;
            result??;
            anyhow::bail!("api server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            let _ = shutdown_tx.send(true);

            if tokio::time::timeout(SHUTDOWN_GRACE, &mut server_task).await.is_err() {
                tracing::warn!("graceful shutdown timed out, aborting server");
                server_task.abort();
            }
            let _ = archiver_task.await;
        }
    }

    tracing::info!("ledger service stopped");
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
