//! Error types for floodtile.
//!
//! Errors fall into two kinds that matter at the HTTP boundary: failures of
//! the remote computation and malformed client input. Configuration errors
//! only occur at startup.

use thiserror::Error;

/// Result type alias using `FloodtileError`.
pub type Result<T> = std::result::Result<T, FloodtileError>;

/// Main error type for all floodtile operations.
#[derive(Debug, Error)]
pub enum FloodtileError {
    // ═══════════════════════════════════════════════════════════════════════════
    // COMPUTATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Transport-level failure talking to a remote service.
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// The remote service answered with a non-success status.
    #[error("Earth Engine returned HTTP {status}: {message}")]
    RemoteError {
        /// HTTP status code
        status: u16,
        /// Error message reported by the service
        message: String,
    },

    /// Credentials could not be obtained.
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// The remote service answered with something we cannot use.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════════
    // REQUEST ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// A required query parameter is absent.
    #[error("Missing query parameter: {0}")]
    MissingParameter(String),

    /// A tile coordinate is not a non-negative integer.
    #[error("Invalid tile coordinate {name}={value:?}: {reason}")]
    InvalidCoordinate {
        /// Parameter name (`x`, `y` or `z`)
        name: String,
        /// Raw value as received
        value: String,
        /// Why parsing failed
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // CONFIGURATION ERRORS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Coarse classification used when mapping errors to responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Resolver or remote-service failure.
    Computation,
    /// Malformed client input.
    Request,
    /// Invalid startup configuration.
    Config,
}

impl FloodtileError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FloodtileError::HttpError(_)
            | FloodtileError::RemoteError { .. }
            | FloodtileError::AuthError(_)
            | FloodtileError::MalformedResponse(_)
            | FloodtileError::JsonError(_) => ErrorKind::Computation,
            FloodtileError::MissingParameter(_) | FloodtileError::InvalidCoordinate { .. } => {
                ErrorKind::Request
            }
            FloodtileError::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// Returns true if this error came from the remote computation.
    pub fn is_computation_error(&self) -> bool {
        self.kind() == ErrorKind::Computation
    }

    /// Returns true if this error was caused by client input.
    pub fn is_request_error(&self) -> bool {
        self.kind() == ErrorKind::Request
    }
}
