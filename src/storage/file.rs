// src/storage/file.rs

use crate::error::{AppError, Result};
use crate::storage::{Persistence, Snapshot};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// JSON file persistence with write-temp-then-rename semantics.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        }
    }
}

impl Persistence for FileStore {
    fn load(&self) -> Result<Option<Snapshot>> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(snapshot.path = %self.path.display(), "No saved key pool snapshot found");
                return Ok(None);
            }
            Err(e) => {
                return Err(AppError::Io {
                    operation: "read_snapshot".to_string(),
                    message: format!("{}: {e}", self.path.display()),
                })
            }
        };

        if contents.trim().is_empty() {
            info!(snapshot.path = %self.path.display(), "Key pool snapshot file is empty");
            return Ok(None);
        }

        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        debug!(
            snapshot.path = %self.path.display(),
            pool.size = snapshot.api_keys.len(),
            "Loaded key pool snapshot"
        );
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;

        // Same directory as the target so the rename never crosses filesystems.
        // tempfile creates the file with 0600 permissions on unix.
        let mut tmp = NamedTempFile::new_in(self.parent_dir())?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        debug!(
            snapshot.path = %self.path.display(),
            pool.size = snapshot.api_keys.len(),
            "Saved key pool snapshot"
        );
        Ok(())
    }
}
