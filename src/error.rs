//! Crate-wide error types.
//!
//! The teacher this crate grew out of gave every module its own
//! `Error { ctx: Context<ErrorKind> }` pair built on the `failure` crate.
//! `failure` has been archived upstream for years; its suggested
//! replacement (and the one the `dropbox-sdk` reference crate uses) is
//! `thiserror`, so the same per-kind-variant shape is kept but expressed
//! with it instead.

use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way an upload can fail, per the wire contract and failure model.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("direct-upload capability probe returned an inconclusive status: HTTP {status}")]
    Capability { status: u16 },

    #[error("failed to obtain an upload ticket: {0}")]
    Ticket(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request was rate-limited{}", retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimit { retry_after: Option<Duration> },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication failed: HTTP {status} - {message}")]
    Auth { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("dataset {persistent_id} did not unlock within {waited:?}")]
    LockTimeout {
        persistent_id: String,
        waited: Duration,
    },

    #[error(
        "checksum mismatch for {path:?}: inventory reports {expected}, computed {actual} ({algo:?})"
    )]
    ChecksumMismatch {
        path: PathBuf,
        algo: crate::checksum::Algorithm,
        expected: String,
        actual: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Error::Configuration(message.into())
    }

    pub fn ticket<S: Into<String>>(message: S) -> Self {
        Error::Ticket(message.into())
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Error::Transport(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation(message.into())
    }

    pub fn not_found<S: Into<String>>(message: S) -> Self {
        Error::NotFound(message.into())
    }

    /// Classifies a non-2xx HTTP status into the matching error kind, per
    /// the §7 propagation policy. `body` is the raw response text.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            400 => Error::Validation(body),
            401 | 403 => Error::Auth {
                status,
                message: body,
            },
            404 => Error::NotFound(body),
            429 => Error::RateLimit { retry_after: None },
            500..=599 => Error::Transport(format!("HTTP {status}: {body}")),
            _ => Error::Transport(format!("unexpected HTTP {status}: {body}")),
        }
    }

    /// True for errors the native-upload retry policy should retry on:
    /// any transport error or HTTP >= 500, and HTTP 429.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::RateLimit { .. } | Error::Http(_))
    }

    /// True when this is the one terminal 400 that must never be retried:
    /// the zip-file-count limit.
    pub fn is_zip_limit(&self) -> bool {
        matches!(self, Error::Validation(msg) if msg.starts_with(crate::native::ZIP_LIMIT_PREFIX))
    }
}
