//! API Handlers
//!
//! HTTP request handlers for the operational endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::config::Config;
use crate::consumers::{ChatMemoizer, SessionManager};
use crate::error::Result;
use crate::models::{HealthResponse, PurgeResponse, StatsResponse, SweepResponse};
use crate::storage::FileStore;

/// Application state shared across all handlers.
///
/// Holds one handle to each consumer; both are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatMemoizer,
    pub sessions: SessionManager,
}

impl AppState {
    pub fn new(chat: ChatMemoizer, sessions: SessionManager) -> Self {
        Self { chat, sessions }
    }

    /// Opens the durable store and builds both consumers from configuration.
    ///
    /// Does not warm the chat cache; call [`ChatMemoizer::warm`] afterwards.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(FileStore::open(config.store_path())?);

        let chat = ChatMemoizer::new(store.clone(), config.chat_capacity, config.sweep_interval())?;
        let sessions = SessionManager::new(
            store,
            config.session_capacity,
            config.sweep_interval(),
            config.session_ttl(),
        )?;
        Ok(Self::new(chat, sessions))
    }

    /// Stops both caches, flushing pending write-backs.
    pub async fn shutdown(&self) {
        self.chat.stop().await;
        self.sessions.stop().await;
    }
}

/// Handler for GET /stats
///
/// Returns statistics of both caches.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.chat.stats().await,
        state.sessions.stats().await,
    ))
}

/// Handler for POST /maintenance/sweep
///
/// Runs one maintenance pass on both caches immediately.
pub async fn sweep_handler(State(state): State<AppState>) -> Json<SweepResponse> {
    Json(SweepResponse {
        chat: state.chat.cache().sweep_now().await,
        sessions: state.sessions.cache().sweep_now().await,
    })
}

/// Handler for POST /maintenance/purge
///
/// Deletes stored sessions whose expiry has passed.
pub async fn purge_handler(State(state): State<AppState>) -> Result<Json<PurgeResponse>> {
    let removed = state.sessions.purge_expired().await?;
    Ok(Json(PurgeResponse { removed }))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
