//! Transaction-set commitment.
//!
//! Leaves and interior nodes are hashed with different prefixes, so a leaf
//! can never be confused with an interior node and the root of a one-element
//! set is not the element itself. A node without a sibling is promoted to the
//! next level unchanged rather than paired with a copy of itself.
//!
//! The commitment is order-sensitive: permuting the transaction ids yields a
//! different root, which binds the block to its transaction ordering.

use crate::hash::{hash_concat, Hash};

const LEAF_PREFIX: u8 = 0x00;
const INTERIOR_PREFIX: u8 = 0x01;

/// Root of an empty transaction set.
pub const EMPTY_MERKLE_ROOT: Hash = Hash::ZERO;

/// Hash of a single leaf.
pub fn leaf_hash(id: &Hash) -> Hash {
    hash_concat(&[&[LEAF_PREFIX], id.as_ref()])
}

/// Hash of an interior node.
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    hash_concat(&[&[INTERIOR_PREFIX], left.as_ref(), right.as_ref()])
}

fn next_level(level: &[Hash]) -> Vec<Hash> {
    level
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => node_hash(left, right),
            [lone] => *lone,
            _ => unreachable!("chunks(2) yields one or two elements"),
        })
        .collect()
}

/// Compute the Merkle root of an ordered list of transaction ids.
pub fn merkle_root(ids: &[Hash]) -> Hash {
    if ids.is_empty() {
        return EMPTY_MERKLE_ROOT;
    }

    let mut level: Vec<Hash> = ids.iter().map(leaf_hash).collect();
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// A Merkle tree that keeps every level, for inclusion proofs.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// Levels from leaf hashes up to the root.
    levels: Vec<Vec<Hash>>,
}

/// Which side of the running hash a sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Inclusion proof for one transaction id.
#[derive(Debug, Clone)]
pub struct MerkleProof {
    /// The transaction id being proven.
    pub leaf: Hash,
    /// Siblings from the leaf upwards. Levels where the node was promoted
    /// without a sibling contribute no step.
    pub steps: Vec<(Hash, Side)>,
}

impl MerkleTree {
    pub fn new(ids: &[Hash]) -> Self {
        if ids.is_empty() {
            return Self { levels: Vec::new() };
        }

        let mut levels = vec![ids.iter().map(leaf_hash).collect::<Vec<_>>()];
        while levels[levels.len() - 1].len() > 1 {
            let next = next_level(&levels[levels.len() - 1]);
            levels.push(next);
        }
        Self { levels }
    }

    pub fn root(&self) -> Hash {
        self.levels
            .last()
            .and_then(|level| level.first())
            .copied()
            .unwrap_or(EMPTY_MERKLE_ROOT)
    }

    pub fn leaf_count(&self) -> usize {
        self.levels.first().map(Vec::len).unwrap_or(0)
    }

    /// Build the inclusion proof for the id at `index`.
    pub fn proof(&self, leaf: Hash, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() || self.levels[0][index] != leaf_hash(&leaf) {
            return None;
        }

        let mut steps = Vec::new();
        let mut idx = index;
        for level in &self.levels[..self.levels.len() - 1] {
            if idx % 2 == 1 {
                steps.push((level[idx - 1], Side::Left));
            } else if idx + 1 < level.len() {
                steps.push((level[idx + 1], Side::Right));
            }
            idx /= 2;
        }

        Some(MerkleProof { leaf, steps })
    }
}

/// Check `proof` against `root`.
pub fn verify_proof(root: &Hash, proof: &MerkleProof) -> bool {
    let computed = proof
        .steps
        .iter()
        .fold(leaf_hash(&proof.leaf), |acc, (sibling, side)| match side {
            Side::Left => node_hash(sibling, &acc),
            Side::Right => node_hash(&acc, sibling),
        });
    computed == *root
}
