//! Asset-denominated transactions over unspent outputs.

use crate::hash::{hash_tagged, Hash};
use serde::{Deserialize, Serialize};
use std::fmt;

const TX_ID_TAG: &str = "sealchain 2024 transaction id";
const OUTPUT_ID_TAG: &str = "sealchain 2024 output id";
const SIG_HASH_TAG: &str = "sealchain 2024 signature hash";

/// Identifier of an asset type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct AssetId(pub Hash);

impl AssetId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(Hash(bytes))
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetId(0x{})", &self.0.to_hex()[..8])
    }
}

/// A quantity of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAmount {
    pub asset_id: AssetId,
    pub amount: u64,
}

/// An input spending a prior output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Id of the output being spent.
    pub spent_output_id: Hash,
    /// Asset and amount of the spent output, as claimed by the spender.
    pub value: AssetAmount,
    /// Control program of the spent output.
    pub control_program: Vec<u8>,
    /// Witness data (signatures) authorizing the spend. Not part of the id.
    pub arguments: Vec<Vec<u8>>,
}

/// A newly created output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: AssetAmount,
    pub control_program: Vec<u8>,
}

/// A transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    /// Earliest block timestamp (ms) at which the transaction is valid.
    pub min_time: u64,
    /// Latest block timestamp (ms) at which the transaction is valid.
    pub max_time: u64,
}

/// The id-bearing part of an input (everything but the witness).
#[derive(Serialize)]
struct InputBody<'a> {
    spent_output_id: &'a Hash,
    value: &'a AssetAmount,
    control_program: &'a [u8],
}

#[derive(Serialize)]
struct TransactionBody<'a> {
    version: u64,
    inputs: Vec<InputBody<'a>>,
    outputs: &'a [TxOutput],
    min_time: u64,
    max_time: u64,
}

impl TxInput {
    /// An unsigned spend of `spent_output_id`.
    pub fn spend(spent_output_id: Hash, value: AssetAmount, control_program: Vec<u8>) -> Self {
        Self {
            spent_output_id,
            value,
            control_program,
            arguments: Vec::new(),
        }
    }
}

impl TxOutput {
    pub fn new(asset_id: AssetId, amount: u64, control_program: Vec<u8>) -> Self {
        Self {
            value: AssetAmount { asset_id, amount },
            control_program,
        }
    }
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: 1,
            inputs,
            outputs,
            min_time: 0,
            max_time: 0,
        }
    }

    /// Transaction id: hash of the canonical body, excluding witnesses.
    pub fn id(&self) -> Hash {
        let body = TransactionBody {
            version: self.version,
            inputs: self
                .inputs
                .iter()
                .map(|input| InputBody {
                    spent_output_id: &input.spent_output_id,
                    value: &input.value,
                    control_program: &input.control_program,
                })
                .collect(),
            outputs: &self.outputs,
            min_time: self.min_time,
            max_time: self.max_time,
        };
        let encoded = bincode::serialize(&body).expect("serialization should not fail");
        hash_tagged(TX_ID_TAG, &[encoded.as_slice()])
    }

    /// Id of the output at `index`, as referenced by later spends.
    pub fn output_id(&self, index: usize) -> Hash {
        hash_tagged(
            OUTPUT_ID_TAG,
            &[self.id().as_ref(), (index as u64).to_le_bytes().as_slice()],
        )
    }

    /// Digest an input at `index` must be signed over.
    pub fn sig_hash(&self, index: usize) -> Hash {
        hash_tagged(
            SIG_HASH_TAG,
            &[self.id().as_ref(), (index as u64).to_le_bytes().as_slice()],
        )
    }

    /// A transaction without inputs mints its outputs.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }
}
