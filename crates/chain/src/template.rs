//! Transaction templates awaiting signatures.

use sealchain_core::{DerivationPath, Signature, Transaction, XPub};
use serde::{Deserialize, Serialize};

/// A key allowed to authorize an input, and the path to its child key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPath {
    pub xpub: XPub,
    pub derivation_path: DerivationPath,
}

/// Signatures required for the input at `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningInstruction {
    pub position: usize,
    pub keys: Vec<KeyPath>,
    /// One slot per key; `None` until signed.
    #[serde(default)]
    pub signatures: Vec<Option<Signature>>,
}

impl SigningInstruction {
    pub fn new(position: usize, keys: Vec<KeyPath>) -> Self {
        let signatures = vec![None; keys.len()];
        Self {
            position,
            keys,
            signatures,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signatures.len() == self.keys.len() && self.signatures.iter().all(Option::is_some)
    }
}

/// A transaction together with what still has to sign it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub transaction: Transaction,
    pub signing_instructions: Vec<SigningInstruction>,
}

impl Template {
    pub fn new(transaction: Transaction) -> Self {
        Self {
            transaction,
            signing_instructions: Vec::new(),
        }
    }

    /// Require `xpub`, derived along `path`, to sign input `position`.
    pub fn require(mut self, position: usize, xpub: XPub, path: DerivationPath) -> Self {
        let key = KeyPath {
            xpub,
            derivation_path: path,
        };
        match self
            .signing_instructions
            .iter_mut()
            .find(|i| i.position == position)
        {
            Some(instruction) => {
                instruction.keys.push(key);
                instruction.signatures.push(None);
            }
            None => self
                .signing_instructions
                .push(SigningInstruction::new(position, vec![key])),
        }
        self
    }

    pub fn signature_count(&self) -> usize {
        self.signing_instructions
            .iter()
            .flat_map(|i| i.signatures.iter())
            .filter(|s| s.is_some())
            .count()
    }

    pub fn is_fully_signed(&self) -> bool {
        self.signing_instructions
            .iter()
            .all(SigningInstruction::is_signed)
    }

    /// The transaction with every collected signature placed in its input's
    /// witness arguments.
    pub fn materialize(&self) -> Transaction {
        let mut tx = self.transaction.clone();
        for instruction in &self.signing_instructions {
            if let Some(input) = tx.inputs.get_mut(instruction.position) {
                input.arguments.extend(
                    instruction
                        .signatures
                        .iter()
                        .flatten()
                        .map(|sig| sig.as_bytes().to_vec()),
                );
            }
        }
        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealchain_core::{AssetAmount, AssetId, Hash, TxInput, TxOutput, XPrv};

    fn tx() -> Transaction {
        let value = AssetAmount {
            asset_id: AssetId::new([1; 32]),
            amount: 5,
        };
        Transaction::new(
            vec![TxInput::spend(Hash([9; 32]), value, vec![0x51])],
            vec![TxOutput::new(value.asset_id, 5, vec![0x52])],
        )
    }

    #[test]
    fn test_require_groups_by_position() {
        let a = XPrv::from_seed(b"a").xpub();
        let b = XPrv::from_seed(b"b").xpub();
        let template = Template::new(tx())
            .require(0, a, DerivationPath::root())
            .require(0, b, DerivationPath::from_indices(&[1]));

        assert_eq!(template.signing_instructions.len(), 1);
        assert_eq!(template.signing_instructions[0].keys.len(), 2);
        assert_eq!(template.signature_count(), 0);
        assert!(!template.is_fully_signed());
    }

    #[test]
    fn test_materialize_keeps_id() {
        let key = XPrv::from_seed(b"a");
        let mut template = Template::new(tx()).require(0, key.xpub(), DerivationPath::root());
        let sig = key.sign(template.transaction.sig_hash(0).as_bytes()).unwrap();
        template.signing_instructions[0].signatures[0] = Some(sig);

        assert!(template.is_fully_signed());
        let signed = template.materialize();
        assert_eq!(signed.inputs[0].arguments, vec![sig.as_bytes().to_vec()]);
        assert_eq!(signed.id(), template.transaction.id());
    }

    #[test]
    fn test_missing_signatures_field_deserializes() {
        let key = XPrv::from_seed(b"a").xpub();
        let template = Template::new(tx()).require(0, key, DerivationPath::root());
        let mut json = serde_json::to_value(&template).unwrap();
        json["signing_instructions"][0]
            .as_object_mut()
            .unwrap()
            .remove("signatures");

        let parsed: Template = serde_json::from_value(json).unwrap();
        assert!(parsed.signing_instructions[0].signatures.is_empty());
        assert!(!parsed.is_fully_signed());
    }
}
