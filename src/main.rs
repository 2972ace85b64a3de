use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wallet_ledger::config::Cli;
use wallet_ledger::{Engine, Store, api, id};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // no wallet ids without a working CSPRNG
    id::ensure_entropy().context("refusing to start")?;

    let store = Store::connect(&cli.store_config())
        .await
        .context("failed to open ledger store")?;
    store
        .bootstrap()
        .await
        .context("failed to create ledger schema")?;

    let engine = Arc::new(Engine::new(store.clone(), cli.engine_config()));

    let listener = TcpListener::bind(&cli.listen)
        .await
        .with_context(|| format!("failed to bind {}", cli.listen))?;
    info!(addr = %cli.listen, "wallet ledger listening");

    axum::serve(listener, api::router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    info!("wallet ledger stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(reason = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
