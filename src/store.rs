// src/store.rs
// =============================================================================
// The ephemeral archive store: a process-wide job_id -> archive mapping with
// timed expiry. Entries are put once on job completion and never mutated.
// Two triggers can reclaim an entry — the background sweep and an expired
// get — whichever fires first wins, so every file removal tolerates the
// target already being gone.
// =============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A finished archive held until its TTL lapses. Immutable once stored.
#[derive(Debug, Clone)]
pub struct StoredArchive {
    pub job_id: String,
    pub file_path: PathBuf,
    pub size_bytes: u64,
    pub expires_at: Instant,
}

/// Result of a lookup.
#[derive(Debug, PartialEq, Eq)]
pub enum Lookup {
    Found(PathBuf),
    Expired,
    NotFound,
}

/// Shared handle to the store. Cloning shares the same map.
#[derive(Debug, Clone, Default)]
pub struct ArchiveStore {
    entries: Arc<Mutex<HashMap<String, StoredArchive>>>,
}

impl ArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, job_id: &str, file_path: PathBuf, size_bytes: u64, ttl: Duration) {
        let entry = StoredArchive {
            job_id: job_id.to_string(),
            file_path,
            size_bytes,
            expires_at: Instant::now() + ttl,
        };
        self.entries.lock().insert(job_id.to_string(), entry);
    }

    /// Looks up an archive. An entry whose expiry has passed is reclaimed on
    /// the spot — indistinguishable from one the sweep already removed.
    pub fn get(&self, job_id: &str) -> Lookup {
        let mut entries = self.entries.lock();
        match entries.get(job_id) {
            None => Lookup::NotFound,
            Some(entry) if entry.expires_at > Instant::now() => {
                Lookup::Found(entry.file_path.clone())
            }
            Some(_) => {
                if let Some(entry) = entries.remove(job_id) {
                    drop(entries);
                    remove_file_quiet(&entry.file_path);
                }
                debug!(job_id, "archive expired on access");
                Lookup::Expired
            }
        }
    }

    /// Removes every expired entry and its backing file. Returns how many
    /// entries were reclaimed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<StoredArchive> = {
            let mut entries = self.entries.lock();
            let lapsed: Vec<String> = entries
                .iter()
                .filter(|(_, e)| e.expires_at <= now)
                .map(|(id, _)| id.clone())
                .collect();
            lapsed
                .iter()
                .filter_map(|id| entries.remove(id))
                .collect()
        };
        for entry in &expired {
            remove_file_quiet(&entry.file_path);
            debug!(job_id = %entry.job_id, "swept expired archive");
        }
        expired.len()
    }

    /// Spawns the background reclaimer. It ticks every `interval` for the
    /// lifetime of the process (or until the handle is aborted).
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick completes immediately
            loop {
                ticker.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    debug!(removed, "sweep cycle reclaimed archives");
                }
            }
        })
    }

    /// Best-effort teardown: drop everything and delete all backing files.
    pub fn shutdown(&self) {
        let drained: Vec<StoredArchive> = {
            let mut entries = self.entries.lock();
            entries.drain().map(|(_, e)| e).collect()
        };
        for entry in &drained {
            remove_file_quiet(&entry.file_path);
        }
        if !drained.is_empty() {
            debug!(count = drained.len(), "store shut down, archives removed");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Deletion must tolerate the file already being gone: both delete-on-access
/// and the timed sweep can race on the same path.
fn remove_file_quiet(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "could not remove archive file");
        }
    }
}
