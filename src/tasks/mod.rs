//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Cache sweeper: expires entries and flushes frequency counters, one per cache
//! - Session janitor: deletes sessions whose stored expiry has passed

mod janitor;
mod sweeper;

pub use janitor::spawn_session_janitor;
pub(crate) use sweeper::spawn_sweeper;
