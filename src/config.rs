// src/config.rs
// =============================================================================
// All tunables for the snapshot engine live here.
//
// The defaults mirror the production service this engine is modeled on:
// a ~19 MiB ceiling on any single download and on the final archive, a
// per-job fan-out of 25 in-flight fetches dispatched in batches of 25, a
// stricter timeout for the root document than for resources, and a
// 300-second retention window swept every 30 seconds.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

/// Which discovery channels the extractor scans. Each source can be turned
/// off independently; all are on by default.
#[derive(Debug, Clone)]
pub struct ScanToggles {
    /// `<link rel=stylesheet>` / `<link type=text/css>` hrefs
    pub stylesheets: bool,
    /// `url(...)` / `@import` references inside inline `<style>` blocks
    pub inline_css: bool,
    /// `<script src>`
    pub scripts: bool,
    /// `<img src|data-src|srcset>` and `<source src|srcset>`
    pub images: bool,
    /// icon / manifest / canonical / preload / alternate `<link>` relations
    pub link_relations: bool,
    /// `<audio|video|embed src>` and `<object data>`
    pub media: bool,
    /// `<meta content>` values that look like URLs
    pub meta: bool,
    /// raw rescan of inline `<style>`/`<script>` text for quoted resource URLs
    pub raw_blocks: bool,
}

impl Default for ScanToggles {
    fn default() -> Self {
        Self {
            stylesheets: true,
            inline_css: true,
            scripts: true,
            images: true,
            link_relations: true,
            media: true,
            meta: true,
            raw_blocks: true,
        }
    }
}

/// Configuration for one `SnapshotService` instance.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Base directory for per-job working trees and finished archives.
    pub workspace_root: PathBuf,
    /// Hard ceiling on any single fetched body, root document included.
    pub max_resource_bytes: u64,
    /// Ceiling on the total uncompressed bytes packed into one archive.
    pub max_archive_bytes: u64,
    /// Maximum in-flight resource fetches for one job.
    pub max_concurrent_fetches: usize,
    /// Resources are dispatched in batches of this size.
    pub batch_size: usize,
    /// Cooperative pause between batches, so one job doesn't hammer an origin.
    pub batch_pause: Duration,
    /// Timeout for the root document fetch. Stricter than resources: a slow
    /// root fails the whole job.
    pub root_timeout: Duration,
    /// Timeout for each individual resource fetch.
    pub resource_timeout: Duration,
    /// How long a finished archive stays retrievable.
    pub archive_ttl: Duration,
    /// How often the background sweeper looks for expired archives.
    pub sweep_interval: Duration,
    /// Discovery channel toggles.
    pub scan: ScanToggles,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("sitepack"),
            max_resource_bytes: 19 * 1024 * 1024,
            max_archive_bytes: 19 * 1024 * 1024,
            max_concurrent_fetches: 25,
            batch_size: 25,
            batch_pause: Duration::from_millis(150),
            root_timeout: Duration::from_secs(20),
            resource_timeout: Duration::from_secs(30),
            archive_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(30),
            scan: ScanToggles::default(),
        }
    }
}
