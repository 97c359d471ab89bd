//! API Module
//!
//! HTTP handlers and routing for the operational REST API.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Statistics of the chat and session caches
//! - `POST /maintenance/sweep` - Run a maintenance pass on both caches
//! - `POST /maintenance/purge` - Delete expired stored sessions

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
