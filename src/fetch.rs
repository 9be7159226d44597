// src/fetch.rs
// =============================================================================
// Bounded-concurrency HTTP fetching with validation.
//
// One Fetcher serves one snapshot job. It applies a browser-like header
// profile, a hard size ceiling on every body (checked against Content-Length
// first, then enforced while streaming so an oversize body is never
// materialized), and — for the root document only — a markup content-type
// allow-list.
//
// Failures are typed (FetchFailure) and memoized per URL: a resource that
// failed once in a job is never attempted again, even if it is discovered
// through another channel.
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::{Client, Response};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::SnapshotConfig;
use crate::extract::ResourceRef;

// Standard browser profile; some origins refuse obviously non-browser agents.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/// Why a single fetch failed. Resource-level failures stay as recorded
/// outcomes; only a root-document failure is promoted to a SnapshotError.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error("content type {0:?} is not markup")]
    InvalidContentType(String),
    #[error("body exceeds the size ceiling")]
    SizeExceeded,
    #[error("empty body")]
    EmptyBody,
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(String),
}

impl FetchFailure {
    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            FetchFailure::Timeout
        } else {
            FetchFailure::Transport(error.to_string())
        }
    }
}

/// A successfully fetched resource body plus the declared content type.
#[derive(Debug)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Per-job HTTP fetcher.
pub struct Fetcher {
    client: Client,
    max_bytes: u64,
    root_timeout: Duration,
    resource_timeout: Duration,
    max_concurrent: usize,
    batch_size: usize,
    batch_pause: Duration,
    failed: Mutex<HashMap<String, FetchFailure>>,
}

impl Fetcher {
    pub fn new(config: &SnapshotConfig) -> Result<Self, FetchFailure> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        Ok(Self {
            client,
            max_bytes: config.max_resource_bytes,
            root_timeout: config.root_timeout,
            resource_timeout: config.resource_timeout,
            max_concurrent: config.max_concurrent_fetches.max(1),
            batch_size: config.batch_size.max(1),
            batch_pause: config.batch_pause,
            failed: Mutex::new(HashMap::new()),
        })
    }

    /// Fetches the root document. On success returns the document text and
    /// the final URL after redirects, which becomes the base for resolving
    /// the page's resource references.
    pub async fn fetch_root(&self, url: &Url) -> Result<(String, Url), FetchFailure> {
        let response = self.request(url, self.root_timeout).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::HttpStatus(status.as_u16()));
        }

        let content_type = header_content_type(&response);
        match content_type.as_deref() {
            Some(ct) if looks_like_markup(ct) => {}
            other => {
                return Err(FetchFailure::InvalidContentType(
                    other.unwrap_or("(missing)").to_string(),
                ));
            }
        }

        let final_url = response.url().clone();
        let bytes = self.read_body(response, self.root_timeout).await?;
        if bytes.is_empty() {
            return Err(FetchFailure::EmptyBody);
        }
        Ok((String::from_utf8_lossy(&bytes).into_owned(), final_url))
    }

    /// Fetches one resource. Any content type is accepted; status, size, and
    /// empty-body rules still apply. The first failure for a URL is recorded
    /// and returned directly on any later attempt.
    pub async fn fetch_resource(&self, url: &Url) -> Result<Fetched, FetchFailure> {
        if let Some(prior) = self.failed.lock().get(url.as_str()).cloned() {
            debug!(url = %url, "skipping resource that already failed this job");
            return Err(prior);
        }
        let result = self.fetch_resource_inner(url).await;
        if let Err(ref failure) = result {
            debug!(url = %url, failure = %failure, "resource fetch failed");
            self.failed.lock().insert(url.to_string(), failure.clone());
        }
        result
    }

    async fn fetch_resource_inner(&self, url: &Url) -> Result<Fetched, FetchFailure> {
        let response = self.request(url, self.resource_timeout).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::HttpStatus(status.as_u16()));
        }
        let content_type = header_content_type(&response);
        let bytes = self.read_body(response, self.resource_timeout).await?;
        if bytes.is_empty() {
            return Err(FetchFailure::EmptyBody);
        }
        Ok(Fetched {
            bytes,
            content_type,
        })
    }

    /// Fetches a deduplicated resource set: dispatched in insertion order in
    /// fixed-size batches, each batch capped at `max_concurrent` in-flight
    /// requests, with a cooperative pause between batches. Completion order
    /// within a batch is not guaranteed (downstream consults the path map by
    /// URL, so it doesn't need to be).
    pub async fn fetch_all(
        &self,
        refs: &[ResourceRef],
    ) -> Vec<(ResourceRef, Result<Fetched, FetchFailure>)> {
        let mut outcomes = Vec::with_capacity(refs.len());
        for (index, batch) in refs.chunks(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_pause).await;
            }
            let batch_outcomes: Vec<_> = stream::iter(batch.iter().cloned().map(|r| async move {
                let result = self.fetch_resource(&r.url).await;
                (r, result)
            }))
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await;
            outcomes.extend(batch_outcomes);
        }
        outcomes
    }

    async fn request(&self, url: &Url, timeout: Duration) -> Result<Response, FetchFailure> {
        match tokio::time::timeout(timeout, self.client.get(url.clone()).send()).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(FetchFailure::from_reqwest(e)),
            Err(_) => Err(FetchFailure::Timeout),
        }
    }

    /// Reads the body under the size ceiling. The declared Content-Length is
    /// checked up front; the ceiling is also enforced chunk by chunk, so a
    /// lying or chunked response is cut off without ever being kept.
    async fn read_body(
        &self,
        mut response: Response,
        timeout: Duration,
    ) -> Result<Vec<u8>, FetchFailure> {
        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(FetchFailure::SizeExceeded);
            }
        }
        let read = async {
            let mut bytes: Vec<u8> = Vec::new();
            while let Some(chunk) = response.chunk().await.map_err(FetchFailure::from_reqwest)? {
                if bytes.len() as u64 + chunk.len() as u64 > self.max_bytes {
                    return Err(FetchFailure::SizeExceeded);
                }
                bytes.extend_from_slice(&chunk);
            }
            Ok(bytes)
        };
        match tokio::time::timeout(timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(FetchFailure::Timeout),
        }
    }

    #[cfg(test)]
    fn recorded_failures(&self) -> usize {
        self.failed.lock().len()
    }
}

fn header_content_type(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// The root document must look like HTML/XHTML/XML.
fn looks_like_markup(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    ["text/html", "application/xhtml+xml", "application/xml", "text/xml"]
        .iter()
        .any(|markup| lower.contains(markup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{spawn_stub, StubRoute};
    use std::collections::HashMap as Routes;

    fn fetcher() -> Fetcher {
        Fetcher::new(&SnapshotConfig::default()).unwrap()
    }

    #[test]
    fn markup_allow_list() {
        assert!(looks_like_markup("text/html; charset=utf-8"));
        assert!(looks_like_markup("application/xhtml+xml"));
        assert!(looks_like_markup("TEXT/XML"));
        assert!(!looks_like_markup("image/png"));
        assert!(!looks_like_markup("application/json"));
    }

    #[tokio::test]
    async fn root_rejects_non_markup_content_type() {
        let mut routes = Routes::new();
        routes.insert(
            "/".to_string(),
            StubRoute::new(200, "application/json", b"{}".to_vec()),
        );
        let base = spawn_stub(routes).await;
        let url = Url::parse(&format!("{base}/")).unwrap();

        let err = fetcher().fetch_root(&url).await.unwrap_err();
        assert!(matches!(err, FetchFailure::InvalidContentType(_)));
    }

    #[tokio::test]
    async fn root_surfaces_http_status() {
        let mut routes = Routes::new();
        routes.insert(
            "/".to_string(),
            StubRoute::new(503, "text/html", b"busy".to_vec()),
        );
        let base = spawn_stub(routes).await;
        let url = Url::parse(&format!("{base}/")).unwrap();

        let err = fetcher().fetch_root(&url).await.unwrap_err();
        assert_eq!(err, FetchFailure::HttpStatus(503));
    }

    #[tokio::test]
    async fn oversize_body_is_rejected_not_truncated() {
        let mut routes = Routes::new();
        routes.insert(
            "/big.bin".to_string(),
            StubRoute::new(200, "application/octet-stream", vec![0u8; 4096]),
        );
        let base = spawn_stub(routes).await;
        let url = Url::parse(&format!("{base}/big.bin")).unwrap();

        let config = SnapshotConfig {
            max_resource_bytes: 1024,
            ..SnapshotConfig::default()
        };
        let fetcher = Fetcher::new(&config).unwrap();
        let err = fetcher.fetch_resource(&url).await.unwrap_err();
        assert_eq!(err, FetchFailure::SizeExceeded);
    }

    #[tokio::test]
    async fn failed_url_is_memoized_and_never_retried() {
        let mut routes = Routes::new();
        routes.insert(
            "/gone.png".to_string(),
            StubRoute::new(404, "text/plain", b"gone".to_vec()),
        );
        let base = spawn_stub(routes).await;
        let url = Url::parse(&format!("{base}/gone.png")).unwrap();

        let fetcher = fetcher();
        let first = fetcher.fetch_resource(&url).await.unwrap_err();
        let second = fetcher.fetch_resource(&url).await.unwrap_err();
        assert_eq!(first, FetchFailure::HttpStatus(404));
        assert_eq!(first, second);
        assert_eq!(fetcher.recorded_failures(), 1);
    }

    #[tokio::test]
    async fn fetch_all_reports_per_resource_outcomes() {
        let mut routes = Routes::new();
        routes.insert(
            "/a.css".to_string(),
            StubRoute::new(200, "text/css", b"body{}".to_vec()),
        );
        let base = spawn_stub(routes).await;

        let refs = vec![
            ResourceRef {
                url: Url::parse(&format!("{base}/a.css")).unwrap(),
                channel: crate::extract::DiscoveryChannel::StylesheetLink,
            },
            ResourceRef {
                url: Url::parse(&format!("{base}/missing.js")).unwrap(),
                channel: crate::extract::DiscoveryChannel::ScriptSrc,
            },
        ];
        let outcomes = fetcher().fetch_all(&refs).await;
        assert_eq!(outcomes.len(), 2);
        let ok = outcomes
            .iter()
            .find(|(r, _)| r.url.path() == "/a.css")
            .unwrap();
        assert!(ok.1.is_ok());
        let missing = outcomes
            .iter()
            .find(|(r, _)| r.url.path() == "/missing.js")
            .unwrap();
        assert_eq!(missing.1.as_ref().unwrap_err(), &FetchFailure::HttpStatus(404));
    }
}
