//! API Routes
//!
//! Configures the Axum router with the operational endpoints.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{health_handler, purge_handler, stats_handler, sweep_handler, AppState};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check endpoint
/// - `GET /stats` - Statistics of both caches
/// - `POST /maintenance/sweep` - Run a maintenance pass now
/// - `POST /maintenance/purge` - Delete expired stored sessions
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/maintenance/sweep", post(sweep_handler))
        .route("/maintenance/purge", post(purge_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    use crate::consumers::{ChatMemoizer, SessionManager};
    use crate::storage::MemoryStore;

    fn create_test_app() -> Router {
        let store = Arc::new(MemoryStore::new());
        let chat = ChatMemoizer::new(store.clone(), 10, Duration::from_secs(60)).unwrap();
        let sessions =
            SessionManager::new(store, 10, Duration::from_secs(60), Duration::from_secs(60))
                .unwrap();
        create_router(AppState::new(chat, sessions))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sweep_requires_post() {
        let app = create_test_app();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/maintenance/sweep")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = create_test_app();

        let response = app
            .oneshot(Request::builder().uri("/get/k").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
