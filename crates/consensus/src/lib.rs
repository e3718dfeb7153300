//! Proof-of-work consensus for sealchain.
//!
//! This crate provides:
//! - Compact difficulty bits and target arithmetic
//! - Header hash verification against a target
//! - A parallel, cancellable sealer that returns the minimal satisfying nonce
//!
//! # Example
//!
//! ```rust,no_run
//! use sealchain_consensus::{verify, CancelToken, SealConfig, Sealer};
//! use sealchain_core::{BlockCommitment, BlockHeader, CanonicalHeaderHasher, Hash};
//!
//! let template = BlockHeader {
//!     version: 1,
//!     height: 1,
//!     previous_block_hash: Hash::ZERO,
//!     seed: Hash::ZERO,
//!     timestamp_ms: 0,
//!     commitment: BlockCommitment::default(),
//!     bits: 0x1E00_0000_000D_BE13,
//!     nonce: 0,
//! };
//!
//! let sealer = Sealer::new(SealConfig::default());
//! let sealed = sealer
//!     .seal(&template, &CanonicalHeaderHasher, &CancelToken::new())
//!     .unwrap();
//! assert!(verify(&sealed.hash, template.bits));
//! ```

pub mod compact;
pub mod nonce;
pub mod pow;

// Re-export commonly used types
pub use compact::{compact_to_target, hash_to_u256, meets_target, target_to_compact, verify};
pub use nonce::{CancelToken, NonceRange, NonceSchedule, WorkerBatches};
pub use pow::{SealConfig, SealError, SealHandle, Sealed, Sealer, StopReason, DEFAULT_MAX_NONCE};
pub use primitive_types::U256;
