// src/error.rs
// =============================================================================
// The error taxonomy for the snapshot engine.
//
// Only root-level failures ever surface as SnapshotError: a bad input URL,
// a root fetch that fails, a hollow archive, or a retrieval miss. Failures
// on individual resources are recorded per resource (see FetchFailure in
// src/fetch.rs) and never abort a job.
// =============================================================================

use thiserror::Error;

use crate::fetch::FetchFailure;

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The submitted URL could not be parsed, or uses an unsupported scheme.
    #[error("invalid url: {0}")]
    InvalidInput(String),

    /// The root document fetch returned a non-success status.
    #[error("upstream returned HTTP {0}")]
    UpstreamHttp(u16),

    /// The root document was the wrong content type, empty, oversize, or
    /// otherwise unusable as markup.
    #[error("upstream content error: {0}")]
    UpstreamContent(String),

    /// Timeout or connection failure while fetching the root document.
    #[error("transport error: {0}")]
    Transport(String),

    /// Nothing qualified for the archive: the snapshot was hollow.
    #[error("snapshot produced no archivable content")]
    ArchiveEmpty,

    /// Unknown, expired, or already-reclaimed job id.
    #[error("no archive for job {0}")]
    NotFound(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

// A FetchFailure only converts into a job-level error on the root document
// path; resource fetches keep their FetchFailure as a recorded outcome.
impl From<FetchFailure> for SnapshotError {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::HttpStatus(code) => SnapshotError::UpstreamHttp(code),
            FetchFailure::InvalidContentType(_)
            | FetchFailure::SizeExceeded
            | FetchFailure::EmptyBody => SnapshotError::UpstreamContent(failure.to_string()),
            FetchFailure::Timeout | FetchFailure::Transport(_) => {
                SnapshotError::Transport(failure.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_http_failure_maps_to_upstream_http() {
        let err = SnapshotError::from(FetchFailure::HttpStatus(404));
        assert!(matches!(err, SnapshotError::UpstreamHttp(404)));
    }

    #[test]
    fn content_failures_map_to_upstream_content() {
        for failure in [
            FetchFailure::InvalidContentType("image/png".to_string()),
            FetchFailure::SizeExceeded,
            FetchFailure::EmptyBody,
        ] {
            let err = SnapshotError::from(failure);
            assert!(matches!(err, SnapshotError::UpstreamContent(_)));
        }
    }

    #[test]
    fn transport_failures_map_to_transport() {
        assert!(matches!(
            SnapshotError::from(FetchFailure::Timeout),
            SnapshotError::Transport(_)
        ));
        assert!(matches!(
            SnapshotError::from(FetchFailure::Transport("connection reset".into())),
            SnapshotError::Transport(_)
        ));
    }
}
