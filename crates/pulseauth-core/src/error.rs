//! Error types for pulseauth.
//!
//! One error type covers every failure the session lifecycle can observe,
//! with explicit variants for transport, authentication, protocol, storage
//! and input validation errors. Callers decide retry policy with
//! [`Error::is_retryable`].

use std::fmt;
use thiserror::Error;

use crate::lifecycle::AuthState;

/// The unified error type for pulseauth operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Network transport errors (DNS, TLS, connection, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The backend refused the credential (HTTP 401/403).
    #[error("authentication rejected (HTTP {status})")]
    AuthInvalid { status: u16 },

    /// An enveloped response carried a non-success code.
    #[error("request rejected (code {code}): {info}")]
    Rejected { code: i64, info: String },

    /// Any other non-success HTTP response.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The response body matched neither known envelope shape.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },

    /// Durable storage could not be read or written.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Input validation errors (bad base URL, empty credentials).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// A guarded transition is already held by another caller.
    #[error("operation rejected while {state}")]
    Busy { state: AuthState },

    /// The session ended while the request was in flight; its result was
    /// discarded.
    #[error("operation abandoned: session ended")]
    Cancelled,
}

impl Error {
    /// Create a malformed-response error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedResponse {
            reason: reason.into(),
        }
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// Authoritative refusals (401/403, rejected envelopes) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Protocol(_) | Error::MalformedResponse { .. } => true,
            Error::AuthInvalid { .. }
            | Error::Rejected { .. }
            | Error::Storage(_)
            | Error::InvalidInput(_)
            | Error::Busy { .. }
            | Error::Cancelled => false,
        }
    }

    /// Whether the backend refused the credential itself.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::AuthInvalid { .. } | Error::Rejected { .. })
    }
}

/// Transport-level errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out")]
    Timeout,

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// A non-success HTTP response that is not an authentication failure.
#[derive(Debug)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Message from the server, if any.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, message: Option<String>) -> Self {
        Self { status, message }
    }
}

/// Errors from a [`Storage`](crate::traits::Storage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading a key failed.
    #[error("failed to read '{key}': {message}")]
    Read { key: String, message: String },

    /// Writing a key failed.
    #[error("failed to write '{key}': {message}")]
    Write { key: String, message: String },

    /// Removing a key failed.
    #[error("failed to remove '{key}': {message}")]
    Remove { key: String, message: String },
}

/// Input validation errors.
#[derive(Debug, Error)]
pub enum InvalidInputError {
    /// Invalid backend base URL.
    #[error("invalid API URL '{value}': {reason}")]
    ApiUrl { value: String, reason: String },

    /// Login identifier or password missing.
    #[error("invalid credentials: {reason}")]
    Credentials { reason: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}
