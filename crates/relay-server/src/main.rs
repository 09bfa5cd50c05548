//! Relay Server
//!
//! Single binary that runs:
//! - Authenticated WebSocket endpoint (`/` and `/ws`) with broadcast fanout
//! - Landing page and status JSON
//! - Operator console: stdin lines are broadcast to every client

use std::future::IntoFuture;
use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use relay_server::config::Cli;
use relay_server::{console, router, state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Environment ─────────────────────────────────────────────
    let dotenv = dotenvy::dotenv();

    // ── Logging ─────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded environment file");
    }

    let cli = Cli::parse();

    // ── Shared state ────────────────────────────────────────────
    let validator = cli.validator()?;
    let state = state::AppState::new(validator);

    // ── Operator console ────────────────────────────────────────
    if !cli.no_console {
        let _console = console::spawn(state.clone());
    }

    // ── Listen ──────────────────────────────────────────────────
    let addr = cli.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("relay-server listening on {addr}");
    tracing::info!("access link: {}", cli.access_link());

    let server = axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    );

    // In-flight broadcasts are not drained: open sockets are dropped on exit.
    tokio::select! {
        result = server.into_future() => result?,
        _ = shutdown_signal() => {}
    }

    tracing::info!("relay-server stopped");

    // The console reader may be parked in a blocking stdin read, which would
    // stall runtime shutdown.
    std::process::exit(0)
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
