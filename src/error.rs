//! Error types for the channel mirror.

use thiserror::Error;

/// Main error type for mirror operations.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// A payload could not be decoded. Non-fatal: the offending event is
    /// dropped and ingestion continues.
    #[error("decode error: {reason}")]
    Decode { reason: String },

    /// An event source terminated its feed.
    #[error("event source disconnected: {name}")]
    SourceDisconnected { name: String },

    /// Malformed configuration, rejected before any ingestion begins.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A background task died instead of exiting cleanly.
    #[error("task failed: {0}")]
    Task(String),
}

impl MirrorError {
    pub(crate) fn decode(reason: impl Into<String>) -> Self {
        MirrorError::Decode {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for MirrorError {
    fn from(e: serde_json::Error) -> Self {
        MirrorError::decode(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for MirrorError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        MirrorError::decode(e.to_string())
    }
}

/// Result type for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
