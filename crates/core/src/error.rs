//! Stable error codes shared by every crate.
//!
//! Library errors stay typed (`thiserror` enums per crate); at the boundary
//! they are reduced to a [`ErrorCode`] plus message so callers can render
//! them without depending on the concrete error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Unknown or double-spent input, or unbalanced amounts.
    Validation,
    DuplicateAlias,
    InvalidAlias,
    /// Password does not unlock the stored key material.
    Auth,
    NotFound,
    /// The signer does not hold the requested key.
    NoKey,
    InvalidCursor,
    TooManyRequested,
    /// Nonce space exhausted, or sealing cancelled, before a solution.
    SealingExhausted,
    /// A re-derived commitment does not match the expected value.
    CommitmentMismatch,
    InvalidProofOfWork,
    InvalidTemplate,
    Storage,
    Internal,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 14] = [
        ErrorCode::Validation,
        ErrorCode::DuplicateAlias,
        ErrorCode::InvalidAlias,
        ErrorCode::Auth,
        ErrorCode::NotFound,
        ErrorCode::NoKey,
        ErrorCode::InvalidCursor,
        ErrorCode::TooManyRequested,
        ErrorCode::SealingExhausted,
        ErrorCode::CommitmentMismatch,
        ErrorCode::InvalidProofOfWork,
        ErrorCode::InvalidTemplate,
        ErrorCode::Storage,
        ErrorCode::Internal,
    ];
}

/// Errors that carry a stable code.
pub trait Coded: std::error::Error {
    fn code(&self) -> ErrorCode;
}

/// A rendered `{code, message}` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
