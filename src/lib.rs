// src/lib.rs
// =============================================================================
// sitepack — snapshot a web page and everything it references into one
// self-contained zip archive.
//
// The pipeline, per job:
//   fetch root -> extract resource references -> download concurrently
//   -> map to bucketed local paths -> rewrite the document -> zip
//
// `SnapshotService` is the front door: `submit` runs the pipeline and parks
// the archive in an ephemeral store, `retrieve` hands the bytes back until
// the TTL lapses.
// =============================================================================

pub mod archive;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod paths;
pub mod service;
pub mod snapshot;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::{ScanToggles, SnapshotConfig};
pub use error::SnapshotError;
pub use fetch::FetchFailure;
pub use service::{SnapshotReceipt, SnapshotService};
pub use snapshot::{DownloadOutcome, SnapshotOutcome};
