//! Error types for Offer Copilot.
//!
//! Library crates use [`OfferCopilotError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Offer Copilot operations.
#[derive(Debug, thiserror::Error)]
pub enum OfferCopilotError {
    /// Configuration loading or validation error (including missing API keys).
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure (connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// A provider API answered with a non-success status.
    #[error("{0}")]
    Provider(String),

    /// JSON parsing or response shape error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Input validation error (missing required fields, bad values, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, OfferCopilotError>;

impl OfferCopilotError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
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

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = OfferCopilotError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = OfferCopilotError::Provider("DeepSeek API error: boom".into());
        assert_eq!(err.to_string(), "DeepSeek API error: boom");

        let err = OfferCopilotError::not_found("tool", "vsl");
        assert_eq!(err.to_string(), "tool not found: vsl");
    }
}
