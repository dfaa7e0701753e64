// src/pool/mod.rs

//! The API credential pool.
//!
//! One `KeyPool` per process holds an ordered list of interchangeable keys and
//! a cursor naming the current one. Callers take the current key with
//! [`KeyPool::acquire_key`] and report back; rate-limit and overload failures
//! advance the cursor. Every change to the key list or cursor is written to
//! the injected [`Persistence`] so the pool survives a restart.
//!
//! All state lives behind a single mutex. Operations are constant time apart
//! from the snapshot write, which is short, synchronous and best-effort: a
//! failed write is logged and the in-memory change stands.

pub mod state;
pub mod status;

pub use state::PoolState;
pub use status::{mask_key, PoolPhase, PoolStatus};

use crate::classify::FailureKind;
use crate::config::PoolConfig;
use crate::metrics;
use crate::storage::Persistence;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Placeholder values that ship in sample configs and must never be used.
pub const DEFAULT_PLACEHOLDER_KEYS: [&str; 2] = [
    "your_gemini_api_key_here",
    "your_actual_gemini_api_key_here",
];

/// Source of wall-clock time for snapshot timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Characters of a key shown in previews.
    pub preview_len: usize,
    /// Values rejected by `update_keys`.
    pub placeholder_keys: Vec<String>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            preview_len: 10,
            placeholder_keys: DEFAULT_PLACEHOLDER_KEYS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl From<&PoolConfig> for PoolSettings {
    fn from(config: &PoolConfig) -> Self {
        Self {
            preview_len: config.preview_len,
            placeholder_keys: config.placeholder_keys.clone(),
        }
    }
}

/// Result of reporting an upstream failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RotationOutcome {
    /// The failed key was current and the cursor moved on.
    Rotated { from: usize, to: usize },
    /// The failed key is no longer current; a concurrent report or a key
    /// update already moved the pool on.
    AlreadyRotated,
    /// The pool has no alternative key.
    Unavailable,
    /// The failure kind is not fixed by switching keys.
    NotRetryable,
}

impl RotationOutcome {
    /// Whether a different key is now current, so a retry is worthwhile.
    pub fn has_alternative(self) -> bool {
        matches!(self, Self::Rotated { .. } | Self::AlreadyRotated)
    }
}

pub struct KeyPool {
    state: Mutex<PoolState>,
    persistence: Arc<dyn Persistence>,
    clock: Arc<dyn Clock>,
    settings: PoolSettings,
}

impl KeyPool {
    /// Create an empty pool. Call [`KeyPool::restore`] to pick up a snapshot.
    pub fn new(persistence: Arc<dyn Persistence>, settings: PoolSettings) -> Self {
        Self {
            state: Mutex::new(PoolState::new()),
            persistence,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Load the persisted snapshot, replacing the in-memory state.
    ///
    /// Returns `true` if a non-empty snapshot was restored. A missing or
    /// unreadable snapshot leaves the pool untouched.
    #[instrument(level = "info", skip(self), name = "key_pool_restore")]
    pub fn restore(&self) -> bool {
        let snapshot = match self.persistence.load() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!("No key pool snapshot; pool starts empty");
                return false;
            }
            Err(e) => {
                error!(error = %e, "Failed to load key pool snapshot; pool starts empty");
                return false;
            }
        };

        if snapshot.is_empty() {
            info!("Key pool snapshot holds no keys; pool starts empty");
            return false;
        }

        let restored = PoolState::from_snapshot(snapshot);
        info!(
            pool.size = restored.len(),
            pool.index = restored.cursor(),
            key.preview = %restored.current().map(|k| self.preview(k)).unwrap_or_default(),
            "Restored key pool from snapshot"
        );
        metrics::set_pool_size(restored.len());
        *self.state.lock() = restored;
        true
    }

    /// Hand out the current key and count the use. `None` when empty.
    ///
    /// The returned key is only the current one at the moment of the call; a
    /// concurrent failure report may rotate the pool while it is in use.
    pub fn acquire_key(&self) -> Option<String> {
        let mut state = self.state.lock();
        let index = state.cursor();
        let size = state.len();
        match state.record_use() {
            Some((key, usage)) => {
                metrics::record_acquisition();
                debug!(
                    key.preview = %self.preview(&key),
                    pool.index = index,
                    pool.size = size,
                    usage,
                    "Acquired API key from pool"
                );
                Some(key)
            }
            None => {
                warn!("No API keys available in pool");
                None
            }
        }
    }

    /// Current key without counting a use.
    pub fn current_key(&self) -> Option<String> {
        self.state.lock().current().map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }

    /// Replace the key set.
    ///
    /// Blank entries and placeholder values are dropped. If nothing remains
    /// the call fails and the pool is left as it was. Otherwise the cursor and
    /// all counts reset and a snapshot is written.
    pub fn update_keys<I, S>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let valid = self.filter_candidates(candidates);
        if valid.is_empty() {
            warn!("Rejected key pool update: no valid API keys provided");
            return false;
        }

        let previews: Vec<String> = valid.iter().map(|k| self.preview(k)).collect();
        let mut state = self.state.lock();
        state.replace(valid);
        self.persist(&mut state);
        metrics::set_pool_size(state.len());
        info!(pool.size = state.len(), keys = ?previews, "Updated API key pool");
        true
    }

    /// Advance to the next key. Fails for pools of zero or one key.
    pub fn rotate(&self) -> bool {
        let mut state = self.state.lock();
        if state.len() <= 1 {
            warn!(pool.size = state.len(), "Only one key available, cannot rotate");
            return false;
        }
        if let Some((from, to)) = self.advance(&mut state) {
            info!(from, to, pool.size = state.len(), "Rotated API key");
        }
        true
    }

    /// Report a failed call made with `key`.
    ///
    /// Only rate-limit and overload failures rotate. The rotation happens only
    /// if `key` is still current, so concurrent reports about the same key
    /// advance the cursor once.
    pub fn report_upstream_failure(&self, key: &str, kind: FailureKind) -> RotationOutcome {
        metrics::record_upstream_failure(kind);
        if !kind.triggers_rotation() {
            debug!(key.preview = %self.preview(key), %kind, "Upstream failure does not warrant rotation");
            return RotationOutcome::NotRetryable;
        }

        let mut state = self.state.lock();
        if state.is_empty() {
            return RotationOutcome::Unavailable;
        }
        if state.current() != Some(key) {
            debug!(
                key.preview = %self.preview(key),
                %kind,
                "Failed key is no longer current; not rotating again"
            );
            return RotationOutcome::AlreadyRotated;
        }
        if state.len() == 1 {
            warn!(
                key.preview = %self.preview(key),
                %kind,
                "Upstream {kind} on the only key in the pool; cannot rotate"
            );
            return RotationOutcome::Unavailable;
        }

        match self.advance(&mut state) {
            Some((from, to)) => {
                warn!(
                    from,
                    to,
                    %kind,
                    key.preview = %self.preview(key),
                    "Upstream {kind} detected; rotated to next API key"
                );
                RotationOutcome::Rotated { from, to }
            }
            None => RotationOutcome::Unavailable,
        }
    }

    /// Report a successful call. Observability only.
    pub fn report_success(&self, key: &str) {
        metrics::record_success();
        debug!(key.preview = %self.preview(key), "Upstream call succeeded");
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus::from_state(&self.state.lock(), self.settings.preview_len)
    }

    pub fn preview(&self, key: &str) -> String {
        mask_key(key, self.settings.preview_len)
    }

    fn advance(&self, state: &mut PoolState) -> Option<(usize, usize)> {
        let moved = state.advance()?;
        metrics::record_rotation();
        self.persist(state);
        Some(moved)
    }

    fn persist(&self, state: &mut PoolState) {
        let now = self.clock.now();
        match self.persistence.save(&state.snapshot(now)) {
            Ok(()) => state.mark_persisted(now),
            Err(e) => {
                metrics::record_persist_failure();
                error!(error = %e, "Failed to persist key pool snapshot; continuing with in-memory state");
            }
        }
    }

    fn filter_candidates<I, S>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .map(|k| k.as_ref().trim().to_string())
            .filter(|k| !k.is_empty())
            .filter(|k| !self.settings.placeholder_keys.iter().any(|p| p == k))
            .collect()
    }
}
