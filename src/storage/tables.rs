//! In-memory tables shared by every storage backend.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ChatRecord, SessionRecord};

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct Tables {
    #[serde(default)]
    pub chat_records: BTreeMap<String, ChatRecord>,
    #[serde(default)]
    pub sessions: BTreeMap<String, SessionRecord>,
}

impl Tables {
    pub fn upsert_chat(&mut self, request: &str, reply: &str, frequency: u64, now: DateTime<Utc>) {
        self.chat_records
            .entry(request.to_string())
            .and_modify(|record| {
                record.reply = reply.to_string();
                record.frequency += frequency;
                record.updated_at = now;
            })
            .or_insert_with(|| ChatRecord {
                request: request.to_string(),
                reply: reply.to_string(),
                frequency,
                created_at: now,
                updated_at: now,
            });
    }

    pub fn top_chats(&self, limit: usize) -> Vec<ChatRecord> {
        let mut records: Vec<ChatRecord> = self.chat_records.values().cloned().collect();
        // BTreeMap iteration is already ordered by request; the sort is stable.
        records.sort_by(|a, b| b.frequency.cmp(&a.frequency));
        records.truncate(limit);
        records
    }

    pub fn delete_expired_sessions(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|record| record.expires_at.is_some_and(|at| at < now))
            .map(|record| record.id.clone())
            .collect();

        for id in &expired {
            self.sessions.remove(id);
        }
        expired
    }
}
