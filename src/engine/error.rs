//! Security engine error types.
//!
//! Every call across the engine boundary reports one of these. Callers in the
//! harness never inspect handle internals, only these outcomes.

use thiserror::Error;

use super::ObjectKind;

/// Errors reported by a [`SecEngine`](super::SecEngine) implementation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid handle")]
    InvalidHandle,

    #[error("No such {kind}: {id:#018x}")]
    NoSuchItem { kind: ObjectKind, id: u64 },

    #[error("{kind} {id:#018x} is already provisioned")]
    ItemAlreadyProvisioned { kind: ObjectKind, id: u64 },

    #[error("Output buffer too small: need {needed} bytes, have {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    #[error("Handle is still referenced by an open operation")]
    HandleInUse,

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Key type not usable for this operation: {0}")]
    UnsupportedKeyType(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Input size {0} is not valid for this operation")]
    InvalidInputSize(usize),

    #[error("Verification failed")]
    VerificationFailed,

    #[error("Operation not supported by this engine")]
    Unsupported,

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crypto failure: {0}")]
    Crypto(String),
}

impl EngineError {
    /// True when the engine no longer holds the handle the call referred to.
    pub fn is_invalid_handle(&self) -> bool {
        matches!(self, Self::InvalidHandle)
    }

    /// True when the failure is the recoverable "buffer too small" condition.
    pub fn is_buffer_too_small(&self) -> bool {
        matches!(self, Self::BufferTooSmall { .. })
    }
}

/// Result alias for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;
