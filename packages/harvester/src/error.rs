//! Typed errors for the harvester library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.
//!
//! Only [`HarvestError::BrowserUnavailable`] is fatal. Every other variant is
//! scoped to a single resource and is absorbed by the orchestrator's signal
//! loop after logging.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while harvesting a resource.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// A browser call failed (network, evaluation, closed page).
    #[error("transient browser failure: {0}")]
    TransientIo(#[from] BrowserError),

    /// A browser call did not answer within the configured bound.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Address matched more than one category pattern.
    #[error("address {address} matches several categories: {matches:?}")]
    ClassificationAmbiguous {
        address: String,
        matches: Vec<String>,
    },

    /// Handler refused or could not produce a payload.
    #[error("extraction failed for {address}: {reason}")]
    Extraction { address: String, reason: String },

    /// The persistence collaborator rejected a payload or snapshot.
    #[error("persistence error: {0}")]
    Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {reason}")]
    Config { reason: String },

    /// The browser collaborator could not be reached at startup.
    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),
}

impl HarvestError {
    /// Whether a later signal may succeed where this one failed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientIo(_) | Self::Timeout { .. })
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

/// Errors reported by a browser-driving collaborator.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// The page went away (tab closed, navigation replaced the frame)
    #[error("page closed: {0}")]
    PageClosed(String),

    /// In-page evaluation threw or returned garbage
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// Remote resource fetch failed
    #[error("fetch of {url} failed: {reason}")]
    Fetch { url: String, reason: String },

    /// Connection to the browser was lost
    #[error("browser disconnected")]
    Disconnected,
}

/// Result type alias for harvest operations.
pub type HarvestResult<T> = std::result::Result<T, HarvestError>;

/// Result type alias for browser collaborator calls.
pub type BrowserResult<T> = std::result::Result<T, BrowserError>;
