//! Error types for backend operations

use payment_core::{FieldErrors, MatchStateError, SessionError};
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Message shown when the backend gave no usable explanation
pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed. Please try again.";

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// Input refused before any request was sent
    #[error("Validation failed: {0}")]
    Validation(#[from] FieldErrors),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Backend answered with a non-success status
    #[error("Backend rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Backend-supplied message, possibly empty
        message: String,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Local file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bank transaction {0} is already matched")]
    AlreadyMatched(i64),

    #[error("Bank transaction {0} is not in the reconciliation book")]
    UnknownTransaction(i64),
}

impl From<MatchStateError> for ClientError {
    fn from(error: MatchStateError) -> Self {
        match error {
            MatchStateError::AlreadyMatched(id) => ClientError::AlreadyMatched(id),
            MatchStateError::UnknownTransaction(id) => ClientError::UnknownTransaction(id),
        }
    }
}

impl ClientError {
    /// Whether the failure happened before anything was sent
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::Validation(_)
                | ClientError::Session(_)
                | ClientError::Config(_)
                | ClientError::Io(_)
                | ClientError::AlreadyMatched(_)
                | ClientError::UnknownTransaction(_)
        )
    }

    /// Single top-level message for the caller to render
    ///
    /// Backend text is passed through verbatim. Transport and decode failures
    /// look the same as a rejection without a message.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Rejected { message, .. } if !message.trim().is_empty() => message.clone(),
            ClientError::Rejected { .. } | ClientError::Transport(_) | ClientError::Decode(_) => {
                GENERIC_FAILURE_MESSAGE.to_string()
            }
            ClientError::Validation(errors) => errors.to_string(),
            other => other.to_string(),
        }
    }

    /// Outcome label recorded in metrics
    pub fn outcome(&self) -> &'static str {
        match self {
            ClientError::Validation(_) => "invalid",
            ClientError::Session(_) => "unauthenticated",
            ClientError::Rejected { .. } => "rejected",
            ClientError::Transport(_) => "transport_error",
            ClientError::Decode(_) => "decode_error",
            ClientError::Config(_) => "config_error",
            ClientError::Io(_) => "io_error",
            ClientError::AlreadyMatched(_) | ClientError::UnknownTransaction(_) => "invalid",
        }
    }
}
