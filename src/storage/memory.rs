// src/storage/memory.rs

use crate::error::{AppError, Result};
use crate::storage::{Persistence, Snapshot};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::trace;

/// In-memory persistence that records every save.
///
/// Lets tests seed a startup snapshot, inspect the exact sequence of writes,
/// and simulate a failing disk.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    stored: Mutex<Option<Snapshot>>,
    saves: Mutex<Vec<Snapshot>>,
    loads: AtomicUsize,
    fail_saves: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a snapshot, as if left behind by a previous run.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            stored: Mutex::new(Some(snapshot)),
            ..Self::default()
        }
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Every snapshot successfully saved, oldest first.
    pub fn saved(&self) -> Vec<Snapshot> {
        self.saves.lock().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().len()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// The snapshot a restarted process would read.
    pub fn current(&self) -> Option<Snapshot> {
        self.stored.lock().clone()
    }
}

impl Persistence for InMemoryStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        trace!("InMemoryStore::load");
        Ok(self.stored.lock().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            trace!("InMemoryStore::save: simulated failure");
            return Err(AppError::StoragePersistence {
                message: "simulated write failure".to_string(),
            });
        }
        trace!(pool.size = snapshot.api_keys.len(), "InMemoryStore::save");
        *self.stored.lock() = Some(snapshot.clone());
        self.saves.lock().push(snapshot.clone());
        Ok(())
    }
}
