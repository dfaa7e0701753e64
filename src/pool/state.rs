// src/pool/state.rs

use crate::storage::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::warn;

/// Mutable pool data. Carries no locking of its own; `KeyPool` owns the lock.
///
/// Invariant: `cursor < keys.len()` whenever `keys` is non-empty, and
/// `cursor == 0` when it is empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolState {
    keys: Vec<String>,
    cursor: usize,
    usage: HashMap<String, u64>,
    last_persisted_at: Option<DateTime<Utc>>,
}

impl PoolState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Index of the current key, `None` while the pool is empty.
    pub fn cursor(&self) -> Option<usize> {
        (!self.keys.is_empty()).then_some(self.cursor)
    }

    pub fn current(&self) -> Option<&str> {
        self.keys.get(self.cursor).map(String::as_str)
    }

    pub fn usage_of(&self, key: &str) -> u64 {
        self.usage.get(key).copied().unwrap_or(0)
    }

    pub fn last_persisted_at(&self) -> Option<DateTime<Utc>> {
        self.last_persisted_at
    }

    /// Swap in a new key list: cursor back to 0, every count back to 0.
    pub fn replace(&mut self, keys: Vec<String>) {
        self.usage = keys.iter().map(|k| (k.clone(), 0)).collect();
        self.keys = keys;
        self.cursor = 0;
    }

    /// Move to the next key (wrapping) and zero its count.
    /// Returns `(from, to)`, or `None` for an empty pool.
    pub fn advance(&mut self) -> Option<(usize, usize)> {
        if self.keys.is_empty() {
            return None;
        }
        let from = self.cursor;
        self.cursor = (self.cursor + 1) % self.keys.len();
        let next = self.keys[self.cursor].clone();
        self.usage.insert(next, 0);
        Some((from, self.cursor))
    }

    /// Count one use of the current key. Returns the key and its new count.
    pub fn record_use(&mut self) -> Option<(String, u64)> {
        let key = self.keys.get(self.cursor)?.clone();
        let count = self.usage.entry(key.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        Some((key, count))
    }

    pub fn snapshot(&self, at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            api_keys: self.keys.clone(),
            current_key_index: self.cursor,
            key_usage_count: self.usage.clone(),
            timestamp: at,
        }
    }

    pub fn mark_persisted(&mut self, at: DateTime<Utc>) {
        self.last_persisted_at = Some(at);
    }

    /// Rebuild state from a stored snapshot, repairing what a hand-edited or
    /// stale file may get wrong.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let Snapshot {
            api_keys,
            current_key_index,
            key_usage_count,
            timestamp,
        } = snapshot;

        let cursor = if api_keys.is_empty() || current_key_index < api_keys.len() {
            current_key_index.min(api_keys.len().saturating_sub(1))
        } else {
            warn!(
                snapshot.index = current_key_index,
                pool.size = api_keys.len(),
                "Snapshot cursor out of range; resetting to first key"
            );
            0
        };

        let usage = api_keys
            .iter()
            .map(|k| (k.clone(), key_usage_count.get(k).copied().unwrap_or(0)))
            .collect();

        Self {
            keys: api_keys,
            cursor,
            usage,
            last_persisted_at: Some(timestamp),
        }
    }
}
