//! Append-only conversation threads.
//!
//! Each thread is a list of [`ThreadMessage`]s keyed by a caller-chosen
//! thread id.  Writes go through a [`DashMap`] entry, which holds that key's
//! shard lock for the duration of the append, so an exchange (user message
//! plus reply) is never interleaved with another write to the same thread.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Sender recorded for messages typed by the user.
pub const USER_SENDER: &str = "user";

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// A single message within a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Unique identifier (UUID v7, so ids sort by creation time).
    pub id: String,
    /// `"user"` or the id of the handler that replied.
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ThreadMessage {
    fn new(sender: &str, content: &str) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            sender: sender.to_owned(),
            content: content.to_owned(),
            timestamp: Utc::now(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  ThreadStore
// ═══════════════════════════════════════════════════════════════════════

/// In-memory store of conversation threads.  Cheap to clone; clones share
/// the same threads.
#[derive(Debug, Clone, Default)]
pub struct ThreadStore {
    threads: Arc<DashMap<String, Vec<ThreadMessage>>>,
}

impl ThreadStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message to `thread_id`, creating the thread if needed.
    pub fn save_message(
        &self,
        thread_id: &str,
        sender: &str,
        content: &str,
    ) -> StoreResult<ThreadMessage> {
        validate(thread_id, sender)?;
        let message = ThreadMessage::new(sender, content);
        self.threads
            .entry(thread_id.to_owned())
            .or_default()
            .push(message.clone());
        debug!(thread_id, sender, "message saved");
        Ok(message)
    }

    /// Append the user's input and the handler's reply as one unit.
    pub fn record_exchange(
        &self,
        thread_id: &str,
        user_input: &str,
        sender: &str,
        reply: &str,
    ) -> StoreResult<()> {
        validate(thread_id, sender)?;
        let mut thread = self.threads.entry(thread_id.to_owned()).or_default();
        thread.push(ThreadMessage::new(USER_SENDER, user_input));
        thread.push(ThreadMessage::new(sender, reply));
        debug!(thread_id, sender, len = thread.len(), "exchange recorded");
        Ok(())
    }

    /// Every message of `thread_id` in append order; empty when unknown.
    pub fn get_thread(&self, thread_id: &str) -> Vec<ThreadMessage> {
        self.threads
            .get(thread_id)
            .map(|thread| thread.value().clone())
            .unwrap_or_default()
    }

    /// All thread ids, sorted.
    pub fn list_threads(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.threads.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }
}

fn validate(thread_id: &str, sender: &str) -> StoreResult<()> {
    if thread_id.trim().is_empty() {
        return Err(StoreError::InvalidArgument(
            "thread id must not be blank".into(),
        ));
    }
    if sender.trim().is_empty() {
        return Err(StoreError::InvalidArgument("sender must not be blank".into()));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_get() {
        let store = ThreadStore::new();
        let saved = store.save_message("t1", "user", "hello").unwrap();
        store.save_message("t1", "default", "hi there").unwrap();

        let thread = store.get_thread("t1");
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0], saved);
        assert_eq!(thread[1].sender, "default");
        assert!(thread[0].timestamp <= thread[1].timestamp);
    }

    #[test]
    fn unknown_thread_is_empty() {
        let store = ThreadStore::new();
        assert!(store.get_thread("missing").is_empty());
        assert_eq!(store.thread_count(), 0);
    }

    #[test]
    fn list_is_sorted() {
        let store = ThreadStore::new();
        for id in ["zeta", "alpha", "mid"] {
            store.save_message(id, "user", "x").unwrap();
        }
        assert_eq!(store.list_threads(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn blank_ids_rejected() {
        let store = ThreadStore::new();
        assert!(matches!(
            store.save_message("  ", "user", "x"),
            Err(StoreError::InvalidArgument(_))
        ));
        assert!(store.record_exchange("", "hi", "math", "x").is_err());
        assert!(store.save_message("t", "", "x").is_err());
        assert_eq!(store.thread_count(), 0);
    }

    #[test]
    fn clones_share_state() {
        let store = ThreadStore::new();
        let other = store.clone();
        other.record_exchange("t", "2+2", "math", "Result: 4.0").unwrap();

        let thread = store.get_thread("t");
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].sender, USER_SENDER);
        assert_eq!(thread[1].content, "Result: 4.0");
    }

    #[test]
    fn message_serializes_with_rfc3339_timestamp() {
        let message = ThreadMessage::new("user", "hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["sender"], "user");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
