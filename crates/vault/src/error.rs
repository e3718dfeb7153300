//! Vault errors.

use sealchain_core::{Coded, ErrorCode};
use sealchain_storage::StorageError;
use sled::transaction::TransactionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("alias already exists: {0}")]
    DuplicateAlias(String),

    #[error("alias must not be empty")]
    InvalidAlias,

    #[error("invalid password")]
    Auth,

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("vault holds no key for {0}")]
    NoKey(String),

    #[error("invalid `after` cursor: {0}")]
    InvalidCursor(String),

    #[error("too many keys requested: {requested} (maximum {max})")]
    TooManyRequested { requested: usize, max: usize },

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("encryption failed")]
    Encryption,

    #[error("corrupt key record: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, VaultError>;

impl From<sled::Error> for VaultError {
    fn from(e: sled::Error) -> Self {
        VaultError::Storage(StorageError::Database(e))
    }
}

impl From<bincode::Error> for VaultError {
    fn from(e: bincode::Error) -> Self {
        VaultError::Storage(StorageError::Serialization(e))
    }
}

impl From<TransactionError<VaultError>> for VaultError {
    fn from(e: TransactionError<VaultError>) -> Self {
        match e {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => e.into(),
        }
    }
}

impl Coded for VaultError {
    fn code(&self) -> ErrorCode {
        match self {
            VaultError::DuplicateAlias(_) => ErrorCode::DuplicateAlias,
            VaultError::InvalidAlias => ErrorCode::InvalidAlias,
            VaultError::Auth => ErrorCode::Auth,
            VaultError::NotFound(_) => ErrorCode::NotFound,
            VaultError::NoKey(_) => ErrorCode::NoKey,
            VaultError::InvalidCursor(_) => ErrorCode::InvalidCursor,
            VaultError::TooManyRequested { .. } => ErrorCode::TooManyRequested,
            VaultError::Storage(_) => ErrorCode::Storage,
            VaultError::Kdf(_) | VaultError::Encryption | VaultError::Corrupt(_) => {
                ErrorCode::Internal
            }
        }
    }
}
