//! Re-derivation of a block's commitment and proof of work.

use sealchain_consensus::verify;
use sealchain_core::{Block, Coded, ErrorCode, Hash, HeaderHasher};
use sealchain_storage::{StateError, StateSnapshot};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitmentField {
    TransactionsRoot,
    StateRoot,
}

impl fmt::Display for CommitmentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitmentField::TransactionsRoot => write!(f, "transactions root"),
            CommitmentField::StateRoot => write!(f, "state root"),
        }
    }
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("{field} mismatch: header has {expected}, computed {computed}")]
    CommitmentMismatch {
        field: CommitmentField,
        expected: Hash,
        computed: Hash,
    },

    #[error("header hash {hash} does not meet bits {bits:#x}")]
    InvalidProofOfWork { hash: Hash, bits: u64 },

    #[error(transparent)]
    State(#[from] StateError),
}

impl Coded for VerifyError {
    fn code(&self) -> ErrorCode {
        match self {
            VerifyError::CommitmentMismatch { .. } => ErrorCode::CommitmentMismatch,
            VerifyError::InvalidProofOfWork { .. } => ErrorCode::InvalidProofOfWork,
            VerifyError::State(e) => e.code(),
        }
    }
}

/// Check a block against the state of its parent and return the state after
/// it.
pub fn verify_block<H>(
    block: &Block,
    parent: &StateSnapshot,
    hasher: &H,
) -> Result<StateSnapshot, VerifyError>
where
    H: HeaderHasher + ?Sized,
{
    let header = &block.header;

    let transactions_root = block.compute_transactions_root();
    if transactions_root != header.commitment.transactions_root {
        return Err(VerifyError::CommitmentMismatch {
            field: CommitmentField::TransactionsRoot,
            expected: header.commitment.transactions_root,
            computed: transactions_root,
        });
    }

    let state = parent.apply_all(&block.transactions)?;
    if state.root_hash() != header.commitment.state_root {
        return Err(VerifyError::CommitmentMismatch {
            field: CommitmentField::StateRoot,
            expected: header.commitment.state_root,
            computed: state.root_hash(),
        });
    }

    let hash = hasher.hash_header(header);
    if !verify(&hash, header.bits) {
        return Err(VerifyError::InvalidProofOfWork {
            hash,
            bits: header.bits,
        });
    }

    debug!(height = header.height, hash = %hash, "block verified");
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::{build_genesis, genesis_template, GenesisParams};
    use sealchain_consensus::{CancelToken, SealConfig, Sealer};
    use sealchain_core::{CanonicalHeaderHasher, TxOutput};

    fn easy_genesis() -> Block {
        let params = GenesisParams {
            bits: (32 << 56) | 0x0F_FFFF,
            ..GenesisParams::mainnet()
        };
        let sealer = Sealer::new(SealConfig::default().with_workers(2));
        build_genesis(&params, &sealer, &CancelToken::new())
            .unwrap()
            .block
    }

    fn verify_from_empty(block: &Block) -> Result<StateSnapshot, VerifyError> {
        verify_block(block, &StateSnapshot::empty(), &CanonicalHeaderHasher)
    }

    #[test]
    fn test_sealed_block_verifies() {
        let block = easy_genesis();
        let state = verify_from_empty(&block).unwrap();
        assert_eq!(state.root_hash(), block.header.commitment.state_root);
    }

    #[test]
    fn test_tampered_transactions() {
        let mut block = easy_genesis();
        let extra = TxOutput::new(crate::NATIVE_ASSET, 1, vec![]);
        block.transactions[0].outputs.push(extra);
        let err = verify_from_empty(&block).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::CommitmentMismatch {
                field: CommitmentField::TransactionsRoot,
                ..
            }
        ));
        assert_eq!(err.code(), ErrorCode::CommitmentMismatch);
    }

    #[test]
    fn test_wrong_parent_state() {
        let block = easy_genesis();
        let parent = StateSnapshot::empty()
            .apply_tx(&block.transactions[0])
            .unwrap();
        // Replaying the coinbase on a state that already holds its output fails.
        let err = verify_block(&block, &parent, &CanonicalHeaderHasher).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[test]
    fn test_state_root_mismatch() {
        let mut block = easy_genesis();
        block.header.commitment.state_root = Hash([1; 32]);
        let err = verify_from_empty(&block).unwrap_err();
        assert!(matches!(
            err,
            VerifyError::CommitmentMismatch {
                field: CommitmentField::StateRoot,
                ..
            }
        ));
    }

    #[test]
    fn test_unsealed_block_fails_pow() {
        let block = genesis_template(&GenesisParams::mainnet()).unwrap().block;
        assert!(!verify(&block.hash(), block.header.bits));
        let err = verify_from_empty(&block).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidProofOfWork);
    }
}
