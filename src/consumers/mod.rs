//! Consumers Module
//!
//! The two users of the write-back cache, one cache instance each.
//!
//! # Consumers
//! - Chat memoizer: normalized request -> reply, warmed from the most frequent records
//! - Session manager: session ID -> value bag, loaded lazily and persisted on write-back

mod chat;
mod session;

pub use chat::{normalize_request, ChatMemoizer};
pub use session::{Session, SessionManager};
