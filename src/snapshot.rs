// src/snapshot.rs
// =============================================================================
// The snapshot orchestrator: drives one job through its states.
//
//   fetching-root -> extracting -> downloading -> rewriting -> done | failed
//
// Transitions are strictly sequential. Any failure while fetching or
// validating the root document fails the whole job before a single resource
// is requested. Once downloading starts, individual resource failures are
// recorded and simply omitted from the tree — partial success is the normal
// outcome. Rewriting points every reference whose resource was saved at the
// local copy; references to failed resources keep their original remote URL.
// =============================================================================

use std::path::Path;

use regex::Regex;
use tracing::{debug, info};
use url::Url;

use crate::config::SnapshotConfig;
use crate::error::SnapshotError;
use crate::extract::{absolutize_css, extract_resources};
use crate::fetch::{FetchFailure, Fetcher};
use crate::paths::PathMapper;

/// Job lifecycle states, in order. There is no retry-and-reenter: a job
/// moves forward or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    FetchingRoot,
    Extracting,
    Downloading,
    Rewriting,
    Done,
}

/// Per-resource record. Exactly one side is set: the job-relative path the
/// resource was saved under, or the failure that excluded it.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub url: String,
    pub result: Result<String, FetchFailure>,
}

/// What one finished job produced inside its working directory.
#[derive(Debug)]
pub struct SnapshotOutcome {
    /// Resources saved to disk (the rewritten document is on top of these).
    pub saved_resources: usize,
    pub outcomes: Vec<DownloadOutcome>,
}

/// Runs one snapshot job into `work_dir`. The directory must be exclusive
/// to this job; the caller namespaces it by job id.
pub async fn run_snapshot(
    config: &SnapshotConfig,
    root_url: &Url,
    work_dir: &Path,
) -> Result<SnapshotOutcome, SnapshotError> {
    let fetcher = Fetcher::new(config).map_err(SnapshotError::from)?;

    debug!(state = ?JobState::FetchingRoot, url = %root_url, "snapshot job started");
    let (document, base) = fetcher.fetch_root(root_url).await?;

    debug!(state = ?JobState::Extracting, base = %base, "root document fetched");
    let extracted = extract_resources(&document, &base, &config.scan);
    info!(resources = extracted.len(), url = %base, "resource discovery complete");

    debug!(state = ?JobState::Downloading, "dispatching resource fetches");
    let fetched = fetcher.fetch_all(&extracted.refs).await;

    let mut mapper = PathMapper::new();
    let mut outcomes = Vec::with_capacity(fetched.len());
    let mut replacements: Vec<(String, String)> = Vec::new();
    let mut saved_resources = 0usize;

    for (resource, result) in fetched {
        match result {
            Ok(body) => {
                let relative = mapper.map(&resource.url);
                let bytes = if is_css(&relative, body.content_type.as_deref()) {
                    // Nested stylesheet assets are not fetched, but after
                    // absolutization they stay resolvable from the saved copy.
                    let text = String::from_utf8_lossy(&body.bytes);
                    absolutize_css(&text, &resource.url).into_bytes()
                } else {
                    body.bytes
                };

                let target = work_dir.join(&relative);
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&target, &bytes).await?;
                saved_resources += 1;

                if let Some(spellings) = extracted.aliases.get(resource.url.as_str()) {
                    for raw in spellings {
                        replacements.push((raw.clone(), relative.clone()));
                    }
                }
                outcomes.push(DownloadOutcome {
                    url: resource.url.to_string(),
                    result: Ok(relative),
                });
            }
            Err(failure) => {
                outcomes.push(DownloadOutcome {
                    url: resource.url.to_string(),
                    result: Err(failure),
                });
            }
        }
    }

    debug!(state = ?JobState::Rewriting, mapped = replacements.len(), "rewriting document");
    let rewritten = rewrite_references(&document, &replacements);
    tokio::fs::write(work_dir.join("index.html"), rewritten).await?;

    info!(
        state = ?JobState::Done,
        saved = saved_resources,
        failed = outcomes.len() - saved_resources,
        "snapshot job finished"
    );
    Ok(SnapshotOutcome {
        saved_resources,
        outcomes,
    })
}

fn is_css(relative_path: &str, content_type: Option<&str>) -> bool {
    relative_path.starts_with("css/")
        || content_type
            .map(|ct| ct.to_ascii_lowercase().contains("text/css"))
            .unwrap_or(false)
}

/// Replaces every raw spelling of a mapped URL with its local path, wherever
/// it appears bounded by attribute or CSS delimiters. This covers quoted
/// src/href values, srcset entries, and inline url(...) without touching
/// prose that merely mentions the URL mid-word. Unmapped references are not
/// in the list and therefore stay remote.
fn rewrite_references(document: &str, replacements: &[(String, String)]) -> String {
    let mut pairs: Vec<&(String, String)> = replacements.iter().collect();
    // Longest spelling first, so "/logo.png" never clobbers "/logo.png?v=2".
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

    let mut output = document.to_string();
    for (raw, local) in pairs {
        let pattern = format!(r#"(["'(=,\s]){}(["')\s,><])"#, regex::escape(raw));
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        output = re
            .replace_all(&output, |caps: &regex::Captures| {
                format!("{}{}{}", &caps[1], local, &caps[2])
            })
            .into_owned();
    }
    output
}
