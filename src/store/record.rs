//! The in-memory key/value record.
//!
//! A `VaultRecord` is the logical content of the vault: an ordered map
//! from string key to an arbitrary JSON value.  Insertion order is
//! preserved so `keys()` enumerates in the order entries were first
//! written.  The record only ever exists decrypted in memory; the
//! persistence layer owns getting it to and from disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One key/value entry with its timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordEntry {
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The ordered key/value map.  Entry count is small (this is a secret
/// store, not a database), so lookups are a linear scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultRecord {
    entries: Vec<RecordEntry>,
}

impl VaultRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    /// Insert or update.  An update keeps the entry's position and its
    /// original `created_at`.
    pub fn set(&mut self, key: &str, value: Value) {
        let now = Utc::now();
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => {
                entry.value = value;
                entry.updated_at = now;
            }
            None => self.entries.push(RecordEntry {
                key: key.to_string(),
                value,
                created_at: now,
                updated_at: now,
            }),
        }
    }

    /// Remove an entry; returns whether it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.key != key);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key.clone()).collect()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
