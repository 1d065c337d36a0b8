// Error types for the downloader core

use thiserror::Error;

use super::extractors::{diagnose_error, BlockingReason};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// Network timeout while talking to the video site (or the extractor hung)
    #[error("Network timeout: the site is not responding")]
    NetworkTimeout,

    /// The site throttled the request (429, too many requests)
    #[error("Request blocked: {}", .0.description())]
    Blocked(BlockingReason),

    /// Access refused: 403, bot check, private, removed, DRM, geo, auth
    #[error("Restricted content: {}", .0.description())]
    Restricted(BlockingReason),

    /// yt-dlp or python not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// URL the extractor does not understand
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to parse yt-dlp JSON output
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Catalog lists the same format id twice, so a selection would be ambiguous
    #[error("Invalid catalog: duplicate format id '{0}'")]
    DuplicateFormatId(String),

    /// Catalog has no video-capable variant
    #[error("No usable formats in catalog")]
    Unsatisfiable,

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DownloadError {
    /// Whether another attempt may succeed without changing anything
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkTimeout => true,
            Self::Blocked(reason) => reason.is_retryable(),
            _ => false,
        }
    }
}

// Classify raw extractor stderr
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("unsupported url") || lower.contains("is not a valid url") || lower.contains("invalid url") {
            return Self::InvalidUrl(s);
        }

        if lower.contains("command not found") || lower.contains("no such file or directory") {
            return Self::ToolNotFound(s);
        }

        match diagnose_error(&s) {
            Some(BlockingReason::NetworkTimeout) => Self::NetworkTimeout,
            Some(reason) if reason.is_retryable() => Self::Blocked(reason),
            Some(BlockingReason::Unknown) | None => {
                if lower.contains("json") || lower.contains("parse") {
                    Self::ParseError(s)
                } else {
                    Self::Unknown(s)
                }
            }
            Some(reason) => Self::Restricted(reason),
        }
    }
}

impl From<&str> for DownloadError {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}

/// Error returned across the adapter boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct FetchError {
    pub error: DownloadError,
    /// Whether the queue processor should retry the item
    pub transient: bool,
}

impl FetchError {
    pub fn transient(error: DownloadError) -> Self {
        Self { error, transient: true }
    }

    pub fn permanent(error: DownloadError) -> Self {
        Self { error, transient: false }
    }
}

impl From<DownloadError> for FetchError {
    fn from(error: DownloadError) -> Self {
        let transient = error.is_transient();
        Self { error, transient }
    }
}

/// Format resolution failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no video-capable variant in catalog")]
    Unsatisfiable,

    /// Extractor produced the same format id twice
    #[error("duplicate container id in catalog: {0}")]
    DuplicateContainerId(String),
}
