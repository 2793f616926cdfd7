//! Domain error types (§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CopyError {
    #[error("failed to copy {source_path} -> {dest_path}: {cause}")]
    Io {
        source_path: String,
        dest_path: String,
        cause: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("catalogue search returned no results for {0:?}")]
    NotFound(String),
    #[error("catalogue request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum SubtitleError {
    #[error("subtitle extraction produced no text for {0}")]
    Empty(String),
    #[error("subtitle extraction failed: {0}")]
    Extraction(String),
}

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("LLM matcher request failed: {0}")]
    Request(String),
    #[error("LLM matcher returned an invalid structured response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by a disc coordinator. Per §4.3/§7, these are always
/// caught inside the state machine and recorded on the folder's result
/// rather than propagated further.
#[derive(Debug, Error)]
pub enum DiscError {
    #[error("subtitle extraction yielded zero files across the disc")]
    NoSubtitles,
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
    #[error(transparent)]
    Matcher(#[from] MatcherError),
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the library coordinator. Per §7, these are projected
/// into `OrganizeLibraryResult` rather than thrown across the signal
/// surface.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("catalogue returned no seasons for this series")]
    CatalogueMiss,
    #[error("integrity verification failed: {0} file(s) missing or truncated")]
    IntegrityFailed(usize),
    #[error("operator rejected the staged layout")]
    Rejected,
    #[error(transparent)]
    Copy(#[from] CopyError),
    #[error("{0}")]
    Other(String),
}
