//! Error types for the relay transport layer

use thiserror::Error;

/// Relay transport and session errors
#[derive(Debug, Error)]
pub enum RelayError {
    /// Relay unreachable or returned a non-2xx status (excluding 404, which
    /// means "no messages yet" and is not an error)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Ciphertext could not be decrypted (bad key or corruption). Scoped to
    /// one message; the poll loop continues.
    #[error("Decryption failure: {0}")]
    Decryption(String),

    /// The threshold engine rejected inbound message bytes. Fatal for the
    /// session.
    #[error("Engine apply failure: {0}")]
    EngineApply(String),

    /// Invalid message format
    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Session is not running or was already stopped
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compile-side error bubbled up from the wallet core
    #[error(transparent)]
    Core(#[from] tss_wallet_core::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether the condition may clear on its own with another poll
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Transport(_) | RelayError::Decryption(_) => true,
            RelayError::Core(tss_wallet_core::Error::SignatureUnavailable(_)) => true,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::Transport(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RelayError>;
