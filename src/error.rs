//! Error taxonomy for the data pipeline.
//!
//! Fetch failures are values, not panics: every network operation returns a
//! [`TransportResult`] so the aggregator can keep gathering the other
//! resources when one of them fails.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// What went wrong with a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No HTTP response at all (DNS, connect, timeout).
    Network,
    /// Status outside `[200, 300)`.
    HttpStatus,
    /// The body looked like HTML rather than JSON.
    NonJsonBody,
    /// The body was not valid JSON.
    Parse,
    /// Valid JSON of the wrong shape.
    Validation,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Network => "network error",
            ErrorKind::HttpStatus => "http error",
            ErrorKind::NonJsonBody => "non-json body",
            ErrorKind::Parse => "invalid json",
            ErrorKind::Validation => "unexpected response shape",
        };
        f.write_str(s)
    }
}

/// A failed fetch, returned as data.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{kind}{}: {message} ({url})", .status.map(|s| format!(" {s}")).unwrap_or_default())]
pub struct FetchError {
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
    pub url: String,
    /// `title: detail` from an NWS problem document, when the error body had one.
    pub problem: Option<String>,
}

impl FetchError {
    pub fn new(kind: ErrorKind, url: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            url: url.to_string(),
            problem: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn validation(url: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, url, message)
    }

    /// Whether another attempt could plausibly succeed: rate limiting,
    /// server errors, HTML error pages and dropped connections.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Network | ErrorKind::NonJsonBody => true,
            ErrorKind::HttpStatus => {
                matches!(self.status, Some(429) | Some(500..=599))
            }
            ErrorKind::Parse | ErrorKind::Validation => false,
        }
    }

    /// Upstream problem text when available, otherwise the plain message.
    pub fn detail(&self) -> &str {
        self.problem.as_deref().unwrap_or(&self.message)
    }
}

/// A successfully fetched JSON document.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub value: Value,
    /// Served from an expired cache entry after live attempts failed.
    pub stale: bool,
}

impl Payload {
    pub fn fresh(value: Value) -> Self {
        Self {
            value,
            stale: false,
        }
    }
}

pub type TransportResult = Result<Payload, FetchError>;

/// Errors that abort a whole dashboard request.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("geocode failed for {query:?}: {message}")]
    Geocode { query: String, message: String },

    #[error("failed to get weather grid point: {}", .0.message)]
    Points(PointFailure),

    #[error(transparent)]
    Transport(#[from] FetchError),
}

impl PipelineError {
    /// Name of the stage that failed, for diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "validation",
            PipelineError::Geocode { .. } => "geocode",
            PipelineError::Points(_) => "points",
            PipelineError::Transport(_) => "transport",
        }
    }
}

/// Why `/points` could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointFailure {
    /// Last URL attempted.
    pub url: String,
    pub status: Option<u16>,
    pub message: String,
    pub problem: Option<String>,
}

impl From<FetchError> for PointFailure {
    fn from(err: FetchError) -> Self {
        Self {
            message: err.to_string(),
            url: err.url,
            status: err.status,
            problem: err.problem,
        }
    }
}
