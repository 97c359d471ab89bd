//! Maintenance Sweeper
//!
//! Background task that periodically expires entries and flushes frequency counters
//! through the cache's write-back hook, with one final pass on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::Shared;

/// Spawns the sweeper for one cache instance.
///
/// The task runs a pass every `interval` (the first one an interval after start) until
/// `stop_rx` fires or its sender is dropped. It then runs one last pass and exits, so no
/// further activity happens after the returned handle completes.
pub(crate) fn spawn_sweeper<V>(
    shared: Arc<Shared<V>>,
    interval: Duration,
    mut stop_rx: oneshot::Receiver<()>,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting cache sweeper with interval of {} ms",
            interval.as_millis()
        );

        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // Err means every handle was dropped; treat it as a stop request.
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    let report = shared.run_sweep().await;
                    debug!(
                        "Cache sweep: expired {} entries, flushed {} counters",
                        report.expired, report.flushed
                    );
                }
            }
        }

        let report = shared.run_sweep().await;
        shared.mark_stopped();
        info!(
            "Cache sweeper stopped after final pass: expired {} entries, flushed {} counters",
            report.expired, report.flushed
        );
    })
}
