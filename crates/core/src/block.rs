//! Block and block header structures.

use crate::hash::{hash, Hash};
use crate::merkle::merkle_root;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

/// Commitment to a block's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockCommitment {
    /// Merkle root over the transaction ids, in block order.
    pub transactions_root: Hash,
    /// State root after applying every transaction to the parent state.
    pub state_root: Hash,
}

/// The header of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: u64,
    pub height: u64,
    /// Hash of the parent header (zero for genesis).
    pub previous_block_hash: Hash,
    pub seed: Hash,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
    pub commitment: BlockCommitment,
    /// Compact difficulty target.
    pub bits: u64,
    pub nonce: u64,
}

/// Canonical header encoding used for proof-of-work hashing.
///
/// Implementations must be pure: the same header, nonce included, always
/// yields the same hash.
pub trait HeaderHasher: Sync {
    fn hash_header(&self, header: &BlockHeader) -> Hash;
}

/// BLAKE3 over the bincode encoding of every header field.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalHeaderHasher;

impl HeaderHasher for CanonicalHeaderHasher {
    fn hash_header(&self, header: &BlockHeader) -> Hash {
        header.hash()
    }
}

impl BlockHeader {
    pub fn hash(&self) -> Hash {
        let encoded = bincode::serialize(self).expect("serialization should not fail");
        hash(&encoded)
    }

    /// A copy of this header with `nonce` set.
    pub fn with_nonce(&self, nonce: u64) -> Self {
        Self {
            nonce,
            ..self.clone()
        }
    }
}

/// A complete block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn tx_ids(&self) -> Vec<Hash> {
        self.transactions.iter().map(Transaction::id).collect()
    }

    /// Merkle root of this block's transactions, in order.
    pub fn compute_transactions_root(&self) -> Hash {
        merkle_root(&self.tx_ids())
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
