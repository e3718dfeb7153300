//! Core blockchain primitives for sealchain.
//!
//! This crate provides the fundamental types used throughout the node:
//! - Hashing (BLAKE3) and the transaction-set Merkle commitment
//! - Hierarchical-deterministic ed25519 keys
//! - Transactions over unspent outputs
//! - Blocks, headers and the header hashing seam used by proof of work
//! - Stable error codes

pub mod block;
pub mod crypto;
pub mod error;
pub mod hash;
pub mod merkle;
pub mod transaction;

// Re-export commonly used types at the crate root
pub use block::{Block, BlockCommitment, BlockHeader, CanonicalHeaderHasher, HeaderHasher};
pub use crypto::{CryptoError, DerivationPath, Signature, XPrv, XPub};
pub use error::{Coded, ErrorCode, ErrorInfo};
pub use hash::{hash, hash_concat, hash_tagged, Hash, H256};
pub use merkle::{merkle_root, verify_proof, MerkleProof, MerkleTree, EMPTY_MERKLE_ROOT};
pub use transaction::{AssetAmount, AssetId, Transaction, TxInput, TxOutput};
