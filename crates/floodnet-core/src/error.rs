//! Error types for floodnet
//!
//! Protocol-invariant violations are distinct from recoverable conditions:
//! a TTL that was already exhausted or an oversized payload fails the
//! operation immediately, while loss and timeouts are handled by the
//! retry machinery and never surface here.

use thiserror::Error;

/// Top-level error type for floodnet
#[derive(Debug, Error)]
pub enum FloodnetError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Protocol-invariant violations; fatal to the operation, never retried
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("TTL exhausted: packet arrived with no hop budget left")]
    TtlExhausted,

    #[error("Payload too large: {actual} bytes exceeds maximum of {max}")]
    PayloadTooLarge { max: usize, actual: usize },

    #[error("Outgoing queue full (capacity {capacity})")]
    QueueFull { capacity: usize },
}

/// Errors from the pluggable payload codec
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Errors from the pluggable confidentiality transform
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Decryption failed: {0}")]
    DecryptFailed(String),
}

/// Result type alias for floodnet operations
pub type FloodnetResult<T> = Result<T, FloodnetError>;
