//! steward-daemon - intent/runtime reconciliation control plane.
//!
//! Single-node, single-writer server. Serves the HTTP control surface,
//! owns the SQLite store, runs the background metrics sampler, and shells
//! out to the external process supervisor for runtime control.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use steward_core::supervisor::CliSupervisor;
use steward_daemon::http::router;
use steward_daemon::sampler;
use steward_daemon::state::AppState;
use steward_daemon::store::Store;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// steward daemon - process-supervision control plane
#[derive(Parser, Debug)]
#[command(name = "steward-daemon")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the SQLite state database
    #[arg(long, default_value = "steward.db")]
    db: PathBuf,

    /// Address to bind the HTTP surface on
    #[arg(long, default_value = "127.0.0.1:7070")]
    bind: SocketAddr,

    /// Supervisor binary invoked for runtime control
    #[arg(long, default_value = "pm2")]
    supervisor_bin: String,

    /// Timeout for a single supervisor invocation, in seconds
    #[arg(long, default_value_t = 30)]
    supervisor_timeout_secs: u64,

    /// Mark session cookies Secure (behind TLS)
    #[arg(long)]
    secure_cookies: bool,

    /// Disable the background metrics sampler
    #[arg(long)]
    no_sampler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Store::open(&args.db)
        .with_context(|| format!("failed to open state database at {}", args.db.display()))?;

    let supervisor = CliSupervisor::new(&args.supervisor_bin)
        .with_timeout(Duration::from_secs(args.supervisor_timeout_secs));
    let state = AppState::new(store.clone(), Arc::new(supervisor), args.secure_cookies);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sampler_handle = if args.no_sampler {
        None
    } else {
        Some(sampler::spawn(store, shutdown_rx))
    };

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(bind = %args.bind, db = %args.db.display(), supervisor = %args.supervisor_bin, "steward daemon listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sampler_handle {
        let _ = handle.await;
    }
    info!("steward daemon stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(_) => return tokio::signal::ctrl_c().await.unwrap_or(()),
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigterm.recv() => {},
    }
    info!("shutdown signal received");
}
