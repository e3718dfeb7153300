//! Rendering of error codes for the boundary layer.

use sealchain_core::{Coded, ErrorCode, ErrorInfo};
use serde::Serialize;
use std::collections::HashMap;

/// Public rendering of one error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    /// Status a transport should answer with.
    pub status: u16,
    /// Stable public code.
    pub code: &'static str,
    pub message: &'static str,
}

const INTERNAL: ErrorEntry = ErrorEntry {
    status: 500,
    code: "SC000",
    message: "Internal error",
};

/// Immutable table from [`ErrorCode`] to its public rendering.
///
/// Build it once at startup and share it by reference.
#[derive(Debug, Clone)]
pub struct ErrorFormatter {
    entries: HashMap<ErrorCode, ErrorEntry>,
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorFormatter {
    pub fn new() -> Self {
        let entry = |status, code, message| ErrorEntry {
            status,
            code,
            message,
        };
        let entries = HashMap::from([
            (ErrorCode::Internal, INTERNAL),
            (ErrorCode::DuplicateAlias, entry(400, "SC050", "Alias already exists")),
            (ErrorCode::InvalidAlias, entry(400, "SC051", "Alias must not be empty")),
            (ErrorCode::Auth, entry(400, "SC052", "Invalid password")),
            (ErrorCode::NotFound, entry(404, "SC053", "Key not found")),
            (ErrorCode::NoKey, entry(400, "SC054", "No key available to sign")),
            (ErrorCode::Validation, entry(400, "SC100", "Invalid transaction")),
            (ErrorCode::SealingExhausted, entry(500, "SC200", "Sealing exhausted")),
            (ErrorCode::CommitmentMismatch, entry(400, "SC201", "Block commitment mismatch")),
            (ErrorCode::InvalidProofOfWork, entry(400, "SC202", "Invalid proof of work")),
            (ErrorCode::InvalidTemplate, entry(400, "SC300", "Invalid signing template")),
            (ErrorCode::InvalidCursor, entry(400, "SC801", "Invalid `after` in query")),
            (ErrorCode::TooManyRequested, entry(400, "SC802", "Too many keys to list")),
            (ErrorCode::Storage, entry(500, "SC900", "Storage failure")),
        ]);
        Self { entries }
    }

    pub fn entry(&self, code: ErrorCode) -> &ErrorEntry {
        self.entries.get(&code).unwrap_or(&INTERNAL)
    }

    /// Reduce an error to its public code and its own message.
    pub fn format(&self, err: &dyn Coded) -> ErrorInfo {
        ErrorInfo {
            code: self.entry(err.code()).code.to_string(),
            message: err.to_string(),
        }
    }

    pub fn status(&self, err: &dyn Coded) -> u16 {
        self.entry(err.code()).status
    }
}
