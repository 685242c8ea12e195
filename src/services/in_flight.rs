//! Registry of files currently being ingested
//!
//! JetStream may redeliver a job while its first delivery is still running
//! (ack wait expired on a large file). Two concurrent runs over the same file
//! would race on the same rows and on the file move, so a second job for a
//! path already held here is handed back to the queue instead.
//!
//! The registry is RAII-based: `try_acquire` returns a `FileGuard` whose drop
//! releases the path.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

/// Releases its path from the registry when dropped.
pub struct FileGuard {
    path: PathBuf,
    registry: InFlightRegistry,
}

impl Drop for FileGuard {
    fn drop(&mut self) {
        self.registry.release(&self.path);
    }
}

#[derive(Clone, Default)]
pub struct InFlightRegistry {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path` for this job, or `None` if another job holds it.
    pub fn try_acquire(&self, path: &Path) -> Option<FileGuard> {
        if !self.paths.lock().insert(path.to_path_buf()) {
            return None;
        }
        Some(FileGuard {
            path: path.to_path_buf(),
            registry: self.clone(),
        })
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.paths.lock().len()
    }

    fn release(&self, path: &Path) {
        self.paths.lock().remove(path);
    }
}
