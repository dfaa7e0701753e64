// src/storage/snapshot.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted form of the pool.
///
/// Holds the full credentials, so the backing file is written owner-only.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Snapshot {
    pub api_keys: Vec<String>,
    #[serde(default)]
    pub current_key_index: usize,
    #[serde(default)]
    pub key_usage_count: HashMap<String, u64>,
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.api_keys.is_empty()
    }
}
