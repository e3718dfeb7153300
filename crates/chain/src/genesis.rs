//! Genesis block assembly from fixed network constants.

use sealchain_consensus::{CancelToken, SealError, Sealer};
use sealchain_core::{
    merkle_root, AssetId, Block, BlockCommitment, BlockHeader, CanonicalHeaderHasher, Coded,
    ErrorCode, Hash, Transaction, TxOutput,
};
use sealchain_storage::{StateError, StateSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// The chain's native asset.
pub const NATIVE_ASSET: AssetId = AssetId::new([0xff; 32]);

#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("genesis transaction rejected: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Seal(#[from] SealError),
}

impl Coded for GenesisError {
    fn code(&self) -> ErrorCode {
        match self {
            GenesisError::State(e) => e.code(),
            GenesisError::Seal(e) => e.code(),
        }
    }
}

/// Constants the genesis block is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisParams {
    pub asset_id: AssetId,
    pub amount: u64,
    pub control_program: Vec<u8>,
    pub tx_version: u64,
    pub min_time: u64,
    pub max_time: u64,
    pub block_version: u64,
    /// Peers expect 1 here, not 0.
    pub height: u64,
    pub seed: Hash,
    pub timestamp_ms: u64,
    pub bits: u64,
}

impl GenesisParams {
    pub fn mainnet() -> Self {
        Self {
            asset_id: NATIVE_ASSET,
            amount: 1_470_000_000_000_000_000,
            control_program: vec![0x51],
            tx_version: 1,
            min_time: 0,
            max_time: 1_511_318_565_142,
            block_version: 1,
            height: 1,
            seed: Hash::ZERO,
            timestamp_ms: 1_511_318_565_142,
            bits: 2_161_727_821_138_738_707,
        }
    }
}

impl Default for GenesisParams {
    fn default() -> Self {
        Self::mainnet()
    }
}

/// A genesis block and the state it commits to.
#[derive(Debug, Clone)]
pub struct Genesis {
    pub block: Block,
    pub state: StateSnapshot,
}

/// The coinbase minting the initial supply.
pub fn genesis_tx(params: &GenesisParams) -> Transaction {
    Transaction {
        version: params.tx_version,
        inputs: Vec::new(),
        outputs: vec![TxOutput::new(
            params.asset_id,
            params.amount,
            params.control_program.clone(),
        )],
        min_time: params.min_time,
        max_time: params.max_time,
    }
}

/// The genesis block with its commitment filled in and nonce 0.
pub fn genesis_template(params: &GenesisParams) -> Result<Genesis, GenesisError> {
    let coinbase = genesis_tx(params);
    let state = StateSnapshot::empty().apply_tx(&coinbase)?;

    let header = BlockHeader {
        version: params.block_version,
        height: params.height,
        previous_block_hash: Hash::ZERO,
        seed: params.seed,
        timestamp_ms: params.timestamp_ms,
        commitment: BlockCommitment {
            transactions_root: merkle_root(&[coinbase.id()]),
            state_root: state.root_hash(),
        },
        bits: params.bits,
        nonce: 0,
    };

    Ok(Genesis {
        block: Block {
            header,
            transactions: vec![coinbase],
        },
        state,
    })
}

/// Build and seal the genesis block.
pub fn build_genesis(
    params: &GenesisParams,
    sealer: &Sealer,
    cancel: &CancelToken,
) -> Result<Genesis, GenesisError> {
    let mut genesis = genesis_template(params)?;
    let sealed = sealer.seal(&genesis.block.header, &CanonicalHeaderHasher, cancel)?;
    genesis.block.header = sealed.header;

    info!(
        hash = %sealed.hash,
        nonce = genesis.block.header.nonce,
        "genesis block sealed"
    );
    Ok(genesis)
}
