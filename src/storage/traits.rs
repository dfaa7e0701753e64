// src/storage/traits.rs

use crate::error::Result;
use crate::storage::Snapshot;

/// Stable storage for pool snapshots.
///
/// `load` is called once at startup; `save` after every mutation that changes
/// the key list or the cursor. Implementations must replace the previous
/// snapshot atomically: a reader sees either the old record or the new one.
pub trait Persistence: Send + Sync {
    /// Read the last saved snapshot. Absence is `Ok(None)`, not an error.
    fn load(&self) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}
