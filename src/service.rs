// src/service.rs
// =============================================================================
// The two operations the engine exposes to callers (an HTTP front end, a
// CLI, ...): submit a URL, retrieve the archive by job id.
//
// One SnapshotService owns the workspace directory, the ephemeral store,
// and the background sweeper. Jobs run in uuid-namespaced working
// directories so concurrent submissions never collide on disk; the working
// tree is always torn down, whether the job succeeded or not.
// =============================================================================

use std::time::Instant;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::archive::{pack_directory, remove_tree_quiet};
use crate::config::SnapshotConfig;
use crate::error::SnapshotError;
use crate::snapshot::run_snapshot;
use crate::store::{ArchiveStore, Lookup};

/// Returned by a successful `submit`. The archive stays retrievable via
/// `download_ref` until the TTL lapses.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotReceipt {
    pub job_id: String,
    pub download_ref: String,
    /// Resources saved alongside the rewritten document.
    pub resource_count: usize,
    /// Size of the finished archive.
    pub byte_size: u64,
    pub elapsed_ms: u128,
    /// True when the archive hit the size cap and had to drop files.
    pub truncated: bool,
}

pub struct SnapshotService {
    config: SnapshotConfig,
    store: ArchiveStore,
    sweeper: JoinHandle<()>,
}

impl SnapshotService {
    /// Prepares the workspace directory and starts the background sweeper.
    pub fn new(config: SnapshotConfig) -> Result<Self, SnapshotError> {
        std::fs::create_dir_all(&config.workspace_root)?;
        let store = ArchiveStore::new();
        let sweeper = store.spawn_sweeper(config.sweep_interval);
        Ok(Self {
            config,
            store,
            sweeper,
        })
    }

    /// Runs one snapshot job end to end and stores the archive under a fresh
    /// job id. Scheme-less input is assumed https.
    pub async fn submit(&self, raw_url: &str) -> Result<SnapshotReceipt, SnapshotError> {
        let started = Instant::now();
        let url = normalize_url(raw_url)?;
        let job_id = Uuid::new_v4().simple().to_string();
        let work_dir = self.config.workspace_root.join(format!("job_{job_id}"));
        tokio::fs::create_dir_all(&work_dir).await?;
        info!(%job_id, url = %url, "snapshot submitted");

        let outcome = match run_snapshot(&self.config, &url, &work_dir).await {
            Ok(outcome) => outcome,
            Err(e) => {
                remove_tree_quiet(&work_dir);
                warn!(%job_id, error = %e, "snapshot failed");
                return Err(e);
            }
        };

        let archive_path = self.config.workspace_root.join(format!("{job_id}.zip"));
        let max_archive_bytes = self.config.max_archive_bytes;
        let pack_input = work_dir.clone();
        let pack_target = archive_path.clone();
        // Zipping is blocking file I/O; keep it off the async workers.
        let packed = tokio::task::spawn_blocking(move || {
            pack_directory(&pack_input, &pack_target, max_archive_bytes)
        })
        .await
        .map_err(|e| SnapshotError::Transport(format!("archive task failed: {e}")))?;

        // The working tree is transient either way.
        remove_tree_quiet(&work_dir);

        let summary = packed?;
        self.store.put(
            &job_id,
            archive_path,
            summary.archive_bytes,
            self.config.archive_ttl,
        );

        let receipt = SnapshotReceipt {
            download_ref: job_id.clone(),
            job_id,
            resource_count: outcome.saved_resources,
            byte_size: summary.archive_bytes,
            elapsed_ms: started.elapsed().as_millis(),
            truncated: summary.truncated,
        };
        info!(
            job_id = %receipt.job_id,
            resources = receipt.resource_count,
            bytes = receipt.byte_size,
            "snapshot stored"
        );
        Ok(receipt)
    }

    /// Returns the archive bytes for a job id. Unknown, expired, and
    /// missing-file cases all fold into NotFound.
    pub async fn retrieve(&self, job_id: &str) -> Result<Vec<u8>, SnapshotError> {
        match self.store.get(job_id) {
            Lookup::Found(path) => tokio::fs::read(&path)
                .await
                .map_err(|_| SnapshotError::NotFound(job_id.to_string())),
            Lookup::Expired | Lookup::NotFound => Err(SnapshotError::NotFound(job_id.to_string())),
        }
    }

    /// Stops the sweeper and deletes every stored archive, best-effort.
    pub fn shutdown(&self) {
        self.sweeper.abort();
        self.store.shutdown();
    }
}

/// Submitted URLs without a scheme are assumed https; anything that still
/// fails to parse, or parses to a non-http(s) scheme, is invalid input.
fn normalize_url(raw: &str) -> Result<Url, SnapshotError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SnapshotError::InvalidInput("empty url".to_string()));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate)
        .map_err(|e| SnapshotError::InvalidInput(format!("{trimmed}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(SnapshotError::InvalidInput(format!(
            "unsupported scheme: {}",
            url.scheme()
        )));
    }
    Ok(url)
}
