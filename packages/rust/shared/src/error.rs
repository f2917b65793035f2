//! Error types for OptDesk.
//!
//! Library crates use [`OptdeskError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all OptDesk operations.
#[derive(Debug, thiserror::Error)]
pub enum OptdeskError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure reaching the solver service (DNS, refused, timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status from the solver service.
    #[error("{url}: HTTP {status}")]
    Status { url: String, status: u16 },

    /// Response body did not match the documented shape.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Canned-answer record missing for the requested identifier.
    #[error("no canned answer registered for problem '{id}'")]
    Data { id: String },

    /// Taxonomy mapping violates the single-branch assumption.
    #[error("taxonomy error: {message}")]
    Taxonomy { message: String },

    /// Invalid session or input state (empty question, nothing to regenerate, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OptdeskError>;

impl OptdeskError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a decode error from any displayable message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode {
            message: msg.into(),
        }
    }

    /// Create a taxonomy error from any displayable message.
    pub fn taxonomy(msg: impl Into<String>) -> Self {
        Self::Taxonomy {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
