//! Session Janitor Task
//!
//! Background task that periodically deletes sessions whose stored expiry has passed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::consumers::SessionManager;

/// Spawns a background task that purges expired sessions every `interval`.
///
/// The task runs until aborted; abort the returned handle during shutdown.
///
/// # Example
/// ```ignore
/// let janitor = spawn_session_janitor(sessions.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// janitor.abort();
/// ```
pub fn spawn_session_janitor(manager: SessionManager, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting session janitor with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match manager.purge_expired().await {
                Ok(0) => debug!("Session purge: no expired sessions found"),
                Ok(removed) => info!("Session purge: removed {} expired sessions", removed),
                Err(err) => warn!("Session purge failed: {}", err),
            }
        }
    })
}
