use serde::{Deserialize, Serialize};

/// User-facing failure categories of an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidUrl,
    Blocked,
    DomainNotAllowed,
    UpstreamUnavailable,
    ExtractionFailed,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Blocked(String),

    #[error("{0}")]
    DomainNotAllowed(String),

    /// One strategy's upstream call failed; the adapter moves on to its next strategy.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("{0}")]
    ExtractionFailed(String),
}

impl ExtractError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            ExtractError::Blocked(_) => ErrorKind::Blocked,
            ExtractError::DomainNotAllowed(_) => ErrorKind::DomainNotAllowed,
            ExtractError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            ExtractError::ExtractionFailed(_) => ErrorKind::ExtractionFailed,
        }
    }

    /// The bare message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            ExtractError::InvalidUrl(msg)
            | ExtractError::Blocked(msg)
            | ExtractError::DomainNotAllowed(msg)
            | ExtractError::UpstreamUnavailable(msg)
            | ExtractError::ExtractionFailed(msg) => msg,
        }
    }
}
