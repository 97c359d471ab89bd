//! Write-back Cache - chat memoization and session caching service
//!
//! Serves health and cache statistics over HTTP while the caches persist lazily.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use writeback_cache::api::create_router;
use writeback_cache::{spawn_session_janitor, AppState, Config};

/// Main entry point for the write-back cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load and validate configuration from environment variables
/// 3. Open the durable store and create both caches (starting their sweepers)
/// 4. Warm the chat cache from the most frequent stored records
/// 5. Start the session janitor
/// 6. Start HTTP server on configured port
/// 7. On SIGINT/SIGTERM, stop both caches (final flush) and abort the janitor
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "writeback_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting write-back cache server");

    let config = Config::from_env();
    info!(
        "Configuration loaded: chat_capacity={}, session_capacity={}, sweep_interval={}s, session_ttl={}s, store={}, port={}",
        config.chat_capacity,
        config.session_capacity,
        config.sweep_interval,
        config.session_ttl,
        config.store_path().display(),
        config.server_port
    );

    let state = AppState::from_config(&config).context("failed to initialize caches")?;
    state
        .chat
        .warm(config.warm_top_n)
        .await
        .context("failed to warm chat cache")?;

    let janitor = spawn_session_janitor(state.sessions.clone(), config.session_purge_interval());
    info!("Session janitor started");

    let app = create_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(janitor))
        .await
        .context("server error")?;

    state.shutdown().await;
    info!("Caches flushed, server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the session janitor and lets the server drain.
async fn shutdown_signal(janitor: JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    janitor.abort();
    warn!("Session janitor aborted");
}
