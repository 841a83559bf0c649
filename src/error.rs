use thiserror::Error;

/// Failures reported by a [`Fetcher`](crate::fetcher::Fetcher).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("{url} is too large: {size} bytes exceeds limit of {limit} bytes")]
    Oversize { url: String, size: u64, limit: u64 },
}

/// Why a single asset could not be ripped. Never fatal for the run.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("unresolvable reference: {0:?}")]
    Unresolvable(String),
    #[error("{url} served {content_type:?}, not an image")]
    UnsupportedContent { url: String, content_type: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that abort the whole rip.
#[derive(Error, Debug)]
pub enum RipError {
    #[error("failed to fetch HTML: {0}")]
    RootFetch(#[source] FetchError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize HTML: {0}")]
    Serialize(#[source] std::io::Error),
}
