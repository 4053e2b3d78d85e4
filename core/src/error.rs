//! Structured error types for Noesis
//!
//! Provides type-safe error handling with rich context for debugging
//! and telemetry integration.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Primary error type for Noesis operations
#[derive(Error, Debug)]
pub enum NoesisError {
    // =========================================================================
    // Model Backend Errors
    // =========================================================================
    /// Backend returned a non-success status
    #[error("backend error: {status} - {message}")]
    BackendError { status: u16, message: String },

    /// Backend is unreachable
    #[error("connection failed: {message}")]
    ConnectionFailed { message: String },

    /// Model not available on the backend
    #[error("model not found: {model}")]
    ModelNotFound { model: String },

    /// Operation timed out
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The request was cancelled before completion
    #[error("operation cancelled")]
    Cancelled,

    // =========================================================================
    // Pipeline / Orchestration Errors
    // =========================================================================
    /// Requested pipeline does not exist
    #[error("unknown pipeline: {name}")]
    UnknownPipeline { name: String },

    /// A pipeline produced no usable output
    #[error("pipeline produced no output: {pipeline}")]
    EmptyPipelineOutput { pipeline: String },

    /// Model output could not be parsed into the expected shape
    #[error("malformed model output: {reason}")]
    MalformedOutput { reason: String },

    // =========================================================================
    // Tool Errors
    // =========================================================================
    /// Tool not found in the registry
    #[error("tool not found: {tool_name}")]
    ToolNotFound { tool_name: String },

    /// Tool execution failed
    #[error("tool execution failed: {tool_name} - {error}")]
    ToolExecutionFailed { tool_name: String, error: String },

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Knowledge graph could not be written
    #[error("knowledge graph write failed: {path}")]
    GraphWriteFailed { path: PathBuf },

    /// Memory log write failed
    #[error("memory log write failed: {path}")]
    MemoryLogWriteFailed { path: PathBuf },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Missing required config
    #[error("missing required configuration: {key}")]
    MissingConfig { key: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal system error
    #[error("internal error: {message}")]
    Internal { message: String },

    // =========================================================================
    // External Error Wrappers
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("template error: {0}")]
    Template(String),
}

impl NoesisError {
    /// Check if the error is transient and the operation may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } => true,
            Self::Timeout { .. } => true,
            Self::BackendError { status, .. } => matches!(status, 429 | 500 | 502 | 503 | 504),
            Self::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// True when the error is a propagated cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for NoesisError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<reqwest::Error> for NoesisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout {
                duration: Duration::from_secs(0),
            };
        }
        if err.is_connect() {
            return Self::ConnectionFailed {
                message: err.to_string(),
            };
        }
        Self::Http(err.to_string())
    }
}

impl From<tera::Error> for NoesisError {
    fn from(err: tera::Error) -> Self {
        Self::Template(err.to_string())
    }
}

/// Result type alias using NoesisError
pub type Result<T> = std::result::Result<T, NoesisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(NoesisError::Timeout {
            duration: Duration::from_secs(30)
        }
        .is_retryable());

        assert!(NoesisError::ConnectionFailed {
            message: "refused".to_string()
        }
        .is_retryable());

        assert!(NoesisError::BackendError {
            status: 503,
            message: "overloaded".to_string()
        }
        .is_retryable());

        assert!(!NoesisError::ToolNotFound {
            tool_name: "WebSearch".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_cancellation_is_not_retryable() {
        let err = NoesisError::Cancelled;
        assert!(err.is_cancellation());
        assert!(!err.is_retryable());
    }
}
