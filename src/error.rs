use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed (HTTP {status}) for {url}")]
    Auth { url: String, status: u16 },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Network error requesting {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Timed out waiting for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("Asset for item {item_id} still not active after {attempts} polls")]
    ActivationTimeout { item_id: String, attempts: u32 },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Coarse classification of an [`Error`], recorded in batch reports.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Config,
    Auth,
    NotFound,
    Transport,
    MalformedResponse,
    ActivationTimeout,
    Io,
}

impl Error {
    pub fn transport(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            url: url.into(),
            source,
        }
    }

    pub fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Maps a non-success status to the matching variant.
    pub fn from_status(url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        let url = url.into();
        match status.as_u16() {
            401 | 403 => Self::Auth {
                url,
                status: status.as_u16(),
            },
            404 => Self::NotFound { what: url },
            code => Self::HttpStatus { url, status: code },
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Config(_) => FailureKind::Config,
            Self::Auth { .. } => FailureKind::Auth,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Transport { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                FailureKind::Transport
            }
            Self::MalformedResponse { .. } => FailureKind::MalformedResponse,
            Self::ActivationTimeout { .. } => FailureKind::ActivationTimeout,
            Self::Io { .. } => FailureKind::Io,
        }
    }

    /// Network failures, server errors and rate limiting may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
