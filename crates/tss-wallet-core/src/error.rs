//! Error types for wallet core operations

use thiserror::Error;

/// Result type alias for wallet core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while deriving keys, assembling signatures or
/// compiling transactions
#[derive(Debug, Error)]
pub enum Error {
    // ============ Payload Errors ============
    /// Payload does not match the compiler's chain family or is missing
    /// required fee fields. Caller error, not retryable.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Unsupported chain
    #[error("Unsupported chain: {0}")]
    UnsupportedChain(String),

    // ============ Encoding Errors ============
    /// Transaction serialization failed. Indicates a logic bug rather than
    /// bad input.
    #[error("Encoding failure: {0}")]
    EncodingFailure(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // ============ Signature Errors ============
    /// No signature share exists yet for the requested preimage. Retryable
    /// by polling the engine again.
    #[error("Signature unavailable for preimage {0}")]
    SignatureUnavailable(String),

    /// A signature failed verification against the derived public key and
    /// exact preimage. Terminal for the signing session.
    #[error("Signature verification failed: {0}")]
    SignatureVerificationFailed(String),

    /// Signature bytes are malformed for the requested encoding
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    // ============ Key Derivation Errors ============
    /// Public key bytes are not a valid curve point or have the wrong length
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    Derivation(String),

    // ============ Internal Errors ============
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<hex::FromHexError> for Error {
    fn from(e: hex::FromHexError) -> Self {
        Error::Deserialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SignatureUnavailable("ab12".to_string());
        assert!(err.to_string().contains("ab12"));
    }

    #[test]
    fn test_hex_error_maps_to_deserialization() {
        let err: Error = hex::decode("zz").unwrap_err().into();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}
