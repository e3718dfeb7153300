//! Versioned state commitments over unspent outputs.
//!
//! A [`StateSnapshot`] is an immutable value. Applying a transaction returns
//! a new snapshot and leaves the parent untouched, so a failed application
//! never exposes partial state and independent branches can be evaluated
//! from the same parent.
//!
//! The root commits to the unspent set, the version (number of applied
//! transactions) and a lineage hash chained over every applied transaction
//! id. Two snapshots holding the same outputs but reached through a
//! different application order therefore have different roots.

use sealchain_core::{hash_tagged, merkle_root, AssetId, Hash, Transaction, TxOutput};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

const ENTRY_TAG: &str = "sealchain 2024 state entry";
const LINEAGE_TAG: &str = "sealchain 2024 state lineage";
const ROOT_TAG: &str = "sealchain 2024 state root";

/// Reasons a transaction cannot be applied.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("input {index} spends unknown output {output_id}")]
    UnknownOutput { index: usize, output_id: Hash },

    #[error("input {index} spends already consumed output {output_id}")]
    AlreadySpent { index: usize, output_id: Hash },

    #[error("input {index} misstates the spent output")]
    InputMismatch { index: usize },

    #[error("amounts do not balance for asset {asset_id:?} (in {inputs}, out {outputs})")]
    Unbalanced {
        asset_id: AssetId,
        inputs: u128,
        outputs: u128,
    },

    #[error("output {index} creates an existing output id")]
    DuplicateOutput { index: usize },

    #[error("amount overflow")]
    Overflow,
}

impl sealchain_core::Coded for StateError {
    fn code(&self) -> sealchain_core::ErrorCode {
        sealchain_core::ErrorCode::Validation
    }
}

pub type Result<T> = std::result::Result<T, StateError>;

/// An unspent output held in state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub asset_id: AssetId,
    pub amount: u64,
    pub control_program: Vec<u8>,
}

impl From<&TxOutput> for OutputEntry {
    fn from(output: &TxOutput) -> Self {
        Self {
            asset_id: output.value.asset_id,
            amount: output.value.amount,
            control_program: output.control_program.clone(),
        }
    }
}

/// Immutable snapshot of chain state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSnapshot {
    version: u64,
    lineage: Hash,
    unspent: Arc<BTreeMap<Hash, OutputEntry>>,
    spent: Arc<BTreeSet<Hash>>,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl StateSnapshot {
    /// The canonical empty state.
    pub fn empty() -> Self {
        Self {
            version: 0,
            lineage: Hash::ZERO,
            unspent: Arc::new(BTreeMap::new()),
            spent: Arc::new(BTreeSet::new()),
        }
    }

    /// Number of transactions applied since the empty state.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get_output(&self, output_id: &Hash) -> Option<&OutputEntry> {
        self.unspent.get(output_id)
    }

    pub fn is_spent(&self, output_id: &Hash) -> bool {
        self.spent.contains(output_id)
    }

    pub fn unspent_count(&self) -> usize {
        self.unspent.len()
    }

    /// Sum of unspent amounts of `asset_id`.
    pub fn balance_of(&self, asset_id: &AssetId) -> u128 {
        self.unspent
            .values()
            .filter(|entry| entry.asset_id == *asset_id)
            .map(|entry| u128::from(entry.amount))
            .sum()
    }

    /// Apply one transaction, producing the child snapshot.
    ///
    /// Copies the parent's output sets once; use [`apply_all`](Self::apply_all)
    /// to apply a block for the cost of a single copy.
    pub fn apply_tx(&self, tx: &Transaction) -> Result<StateSnapshot> {
        self.apply_all([tx])
    }

    /// Apply `txs` in order. Stops at the first failure, returning it.
    pub fn apply_all<'a, I>(&self, txs: I) -> Result<StateSnapshot>
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut draft = Draft::of(self);
        for tx in txs {
            draft.apply(tx)?;
        }
        Ok(draft.finish())
    }

    /// Commitment to the full snapshot contents.
    pub fn root_hash(&self) -> Hash {
        let entries: Vec<Hash> = self
            .unspent
            .iter()
            .map(|(id, entry)| {
                let encoded = bincode::serialize(entry).expect("serialization should not fail");
                hash_tagged(ENTRY_TAG, &[id.as_ref(), encoded.as_slice()])
            })
            .collect();

        hash_tagged(
            ROOT_TAG,
            &[
                self.version.to_le_bytes().as_slice(),
                self.lineage.as_ref(),
                merkle_root(&entries).as_ref(),
            ],
        )
    }
}

/// Mutable working copy of a snapshot. Dropped on the first failure, so the
/// parent never observes a partial application.
struct Draft {
    version: u64,
    lineage: Hash,
    unspent: BTreeMap<Hash, OutputEntry>,
    spent: BTreeSet<Hash>,
}

impl Draft {
    fn of(snapshot: &StateSnapshot) -> Self {
        Self {
            version: snapshot.version,
            lineage: snapshot.lineage,
            unspent: (*snapshot.unspent).clone(),
            spent: (*snapshot.spent).clone(),
        }
    }

    fn apply(&mut self, tx: &Transaction) -> Result<()> {
        let mut balance: BTreeMap<AssetId, (u128, u128)> = BTreeMap::new();

        for (index, input) in tx.inputs.iter().enumerate() {
            let output_id = input.spent_output_id;
            let entry = match self.unspent.remove(&output_id) {
                Some(entry) => entry,
                None if self.spent.contains(&output_id) => {
                    return Err(StateError::AlreadySpent { index, output_id })
                }
                None => return Err(StateError::UnknownOutput { index, output_id }),
            };
            if entry.asset_id != input.value.asset_id
                || entry.amount != input.value.amount
                || entry.control_program != input.control_program
            {
                return Err(StateError::InputMismatch { index });
            }
            self.spent.insert(output_id);

            let sums = balance.entry(entry.asset_id).or_default();
            sums.0 = sums
                .0
                .checked_add(u128::from(entry.amount))
                .ok_or(StateError::Overflow)?;
        }

        for output in &tx.outputs {
            let sums = balance.entry(output.value.asset_id).or_default();
            sums.1 = sums
                .1
                .checked_add(u128::from(output.value.amount))
                .ok_or(StateError::Overflow)?;
        }

        if !tx.is_coinbase() {
            if let Some((asset_id, (inputs, outputs))) =
                balance.iter().find(|(_, (inputs, outputs))| inputs != outputs)
            {
                return Err(StateError::Unbalanced {
                    asset_id: *asset_id,
                    inputs: *inputs,
                    outputs: *outputs,
                });
            }
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            let output_id = tx.output_id(index);
            if self.spent.contains(&output_id)
                || self.unspent.insert(output_id, output.into()).is_some()
            {
                return Err(StateError::DuplicateOutput { index });
            }
        }

        self.version += 1;
        self.lineage = hash_tagged(LINEAGE_TAG, &[self.lineage.as_ref(), tx.id().as_ref()]);
        Ok(())
    }

    fn finish(self) -> StateSnapshot {
        StateSnapshot {
            version: self.version,
            lineage: self.lineage,
            unspent: Arc::new(self.unspent),
            spent: Arc::new(self.spent),
        }
    }
}
