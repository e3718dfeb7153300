//! Batch signing of transaction templates.
//!
//! A [`Signer`] answers one `(xpub, path, digest)` request with a signature,
//! a skip ("not my key") or a hard error. The [`SigningCoordinator`] walks
//! every key slot of every template; a hard error replaces only the template
//! it occurred in, and results stay aligned with the input batch.

use crate::errors::ErrorFormatter;
use crate::template::Template;
use sealchain_core::{
    Coded, CryptoError, DerivationPath, ErrorCode, ErrorInfo, Hash, Signature, XPrv, XPub,
};
use sealchain_vault::{Vault, VaultError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum SignError {
    #[error(transparent)]
    Vault(#[from] VaultError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    #[error("no available key could sign the template")]
    NoKey,
}

impl Coded for SignError {
    fn code(&self) -> ErrorCode {
        match self {
            SignError::Vault(e) => e.code(),
            SignError::Crypto(_) => ErrorCode::Internal,
            SignError::InvalidTemplate(_) => ErrorCode::InvalidTemplate,
            SignError::NoKey => ErrorCode::NoKey,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutcome {
    Signed(Signature),
    /// The signer does not hold this key; leave the slot unsigned.
    Skip,
}

/// A capability that can sign digests for some set of keys.
pub trait Signer {
    fn sign(
        &self,
        xpub: &XPub,
        path: &DerivationPath,
        digest: &Hash,
    ) -> Result<SignOutcome, SignError>;
}

/// Signs with a private key held in memory.
pub struct InlineSigner {
    xprv: XPrv,
    xpub: XPub,
}

impl InlineSigner {
    pub fn new(xprv: XPrv) -> Self {
        let xpub = xprv.xpub();
        Self { xprv, xpub }
    }
}

impl Signer for InlineSigner {
    fn sign(
        &self,
        xpub: &XPub,
        path: &DerivationPath,
        digest: &Hash,
    ) -> Result<SignOutcome, SignError> {
        if *xpub != self.xpub {
            return Ok(SignOutcome::Skip);
        }
        let signature = self.xprv.derive(path).sign(digest.as_bytes())?;
        Ok(SignOutcome::Signed(signature))
    }
}

/// Signs through the vault with one key and its password.
pub struct VaultSigner<'a> {
    vault: &'a Vault,
    xpub: XPub,
    password: Zeroizing<String>,
}

impl<'a> VaultSigner<'a> {
    pub fn new(vault: &'a Vault, xpub: XPub, password: impl Into<String>) -> Self {
        Self {
            vault,
            xpub,
            password: Zeroizing::new(password.into()),
        }
    }
}

impl Signer for VaultSigner<'_> {
    fn sign(
        &self,
        xpub: &XPub,
        path: &DerivationPath,
        digest: &Hash,
    ) -> Result<SignOutcome, SignError> {
        if *xpub != self.xpub {
            return Ok(SignOutcome::Skip);
        }
        match self
            .vault
            .sign(xpub, path, digest.as_bytes(), self.password.as_str())
        {
            Ok(signature) => Ok(SignOutcome::Signed(signature)),
            Err(VaultError::NoKey(_)) => Ok(SignOutcome::Skip),
            Err(e) => Err(e.into()),
        }
    }
}

/// Outcome for one template of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignResult {
    Signed(Template),
    Failed(ErrorInfo),
}

impl SignResult {
    pub fn template(&self) -> Option<&Template> {
        match self {
            SignResult::Signed(t) => Some(t),
            SignResult::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            SignResult::Signed(_) => None,
            SignResult::Failed(e) => Some(e),
        }
    }
}

/// Signs batches of templates, isolating failures per template.
pub struct SigningCoordinator<'a> {
    formatter: &'a ErrorFormatter,
}

impl<'a> SigningCoordinator<'a> {
    pub fn new(formatter: &'a ErrorFormatter) -> Self {
        Self { formatter }
    }

    /// Sign every template. Never fails as a whole: result `i` belongs to
    /// template `i`.
    pub fn sign_batch(&self, templates: Vec<Template>, signer: &dyn Signer) -> Vec<SignResult> {
        let total = templates.len();
        let results: Vec<SignResult> = templates
            .into_iter()
            .enumerate()
            .map(|(index, template)| match sign_template(template, signer) {
                Ok(template) => SignResult::Signed(template),
                Err(e) => {
                    warn!(index, error = %e, "template not signed");
                    SignResult::Failed(self.formatter.format(&e))
                }
            })
            .collect();

        let failed = results.iter().filter(|r| r.error().is_some()).count();
        info!(total, failed, "signed template batch");
        results
    }
}

/// Fill every open signature slot the signer can sign.
///
/// A template that still has open slots but received no signature at all is
/// reported as [`SignError::NoKey`].
pub fn sign_template(mut template: Template, signer: &dyn Signer) -> Result<Template, SignError> {
    let tx = &template.transaction;
    let mut open = 0usize;
    let mut signed = 0usize;

    for instruction in &mut template.signing_instructions {
        if instruction.position >= tx.inputs.len() {
            return Err(SignError::InvalidTemplate(format!(
                "signing position {} but transaction has {} inputs",
                instruction.position,
                tx.inputs.len()
            )));
        }
        if instruction.signatures.len() > instruction.keys.len() {
            return Err(SignError::InvalidTemplate(format!(
                "position {} carries {} signatures for {} keys",
                instruction.position,
                instruction.signatures.len(),
                instruction.keys.len()
            )));
        }
        instruction.signatures.resize(instruction.keys.len(), None);

        let digest = tx.sig_hash(instruction.position);
        for (key, slot) in instruction.keys.iter().zip(instruction.signatures.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            open += 1;
            match signer.sign(&key.xpub, &key.derivation_path, &digest)? {
                SignOutcome::Signed(signature) => {
                    *slot = Some(signature);
                    signed += 1;
                }
                SignOutcome::Skip => {
                    debug!(
                        position = instruction.position,
                        xpub = %key.xpub,
                        "skipped key"
                    )
                }
            }
        }
    }

    if open > 0 && signed == 0 {
        return Err(SignError::NoKey);
    }
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::SigningInstruction;
    use sealchain_core::{AssetAmount, AssetId, Transaction, TxInput, TxOutput};

    fn tx(inputs: usize) -> Transaction {
        let value = AssetAmount {
            asset_id: AssetId::new([1; 32]),
            amount: 10,
        };
        Transaction::new(
            (0..inputs)
                .map(|i| TxInput::spend(Hash([i as u8; 32]), value, vec![0x51]))
                .collect(),
            vec![TxOutput::new(value.asset_id, 10 * inputs as u64, vec![0x52])],
        )
    }

    fn assert_valid(template: &Template) {
        for instruction in &template.signing_instructions {
            let digest = template.transaction.sig_hash(instruction.position);
            for (key, sig) in instruction.keys.iter().zip(&instruction.signatures) {
                let child = key.xpub.derive(&key.derivation_path).unwrap();
                assert!(child.verify(digest.as_bytes(), &sig.unwrap()).is_ok());
            }
        }
    }

    #[test]
    fn test_inline_signs_own_slots() {
        let key = XPrv::from_seed(b"inline");
        let path = DerivationPath::from_indices(&[7]);
        let template = Template::new(tx(2))
            .require(0, key.xpub(), path)
            .require(1, key.xpub(), DerivationPath::root());

        let signed = sign_template(template, &InlineSigner::new(key)).unwrap();
        assert!(signed.is_fully_signed());
        assert_valid(&signed);
    }

    #[test]
    fn test_foreign_slot_is_left_open() {
        let mine = XPrv::from_seed(b"mine");
        let theirs = XPrv::from_seed(b"theirs").xpub();
        let template = Template::new(tx(2))
            .require(0, mine.xpub(), DerivationPath::root())
            .require(1, theirs, DerivationPath::root());

        let signed = sign_template(template, &InlineSigner::new(mine)).unwrap();
        assert_eq!(signed.signature_count(), 1);
        assert!(signed.signing_instructions[1].signatures[0].is_none());
    }

    #[test]
    fn test_nothing_signable_is_no_key() {
        let stranger = XPrv::from_seed(b"x").xpub();
        let template = Template::new(tx(1)).require(0, stranger, DerivationPath::root());
        let signer = InlineSigner::new(XPrv::from_seed(b"y"));
        let err = sign_template(template, &signer).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoKey);
    }

    #[test]
    fn test_template_without_instructions_passes() {
        let template = Template::new(tx(1));
        let signer = InlineSigner::new(XPrv::from_seed(b"y"));
        let signed = sign_template(template.clone(), &signer).unwrap();
        assert_eq!(signed, template);
    }

    #[test]
    fn test_bad_position_is_invalid_template() {
        let key = XPrv::from_seed(b"k");
        let mut template = Template::new(tx(1));
        template.signing_instructions.push(SigningInstruction::new(
            3,
            vec![crate::template::KeyPath {
                xpub: key.xpub(),
                derivation_path: DerivationPath::root(),
            }],
        ));
        let err = sign_template(template, &InlineSigner::new(key)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTemplate);
    }

    #[test]
    fn test_extra_signatures_are_rejected() {
        let key = XPrv::from_seed(b"extra");
        let signer = InlineSigner::new(key.clone());
        let mut template = Template::new(tx(1)).require(0, key.xpub(), DerivationPath::root());
        let signature = key.sign(b"unrelated").unwrap();
        template.signing_instructions[0].signatures = vec![None, Some(signature)];

        let err = sign_template(template, &signer).unwrap_err();
        assert!(matches!(err, SignError::InvalidTemplate(_)));

        // Fewer signatures than keys just leaves the rest open.
        let mut template = Template::new(tx(1))
            .require(0, key.xpub(), DerivationPath::root())
            .require(0, key.xpub(), DerivationPath::from_indices(&[1]));
        template.signing_instructions[0].signatures = vec![None];
        let signed = sign_template(template, &signer).unwrap();
        assert!(signed.is_fully_signed());
    }

    /// Fails hard on one key, signs everything else.
    struct Flaky {
        key: XPrv,
        poisoned: XPub,
    }

    impl Signer for Flaky {
        fn sign(
            &self,
            xpub: &XPub,
            path: &DerivationPath,
            digest: &Hash,
        ) -> Result<SignOutcome, SignError> {
            if *xpub == self.poisoned {
                return Err(SignError::Vault(VaultError::Auth));
            }
            InlineSigner::new(self.key.clone()).sign(xpub, path, digest)
        }
    }

    #[test]
    fn test_batch_isolates_failures_by_index() {
        let key = XPrv::from_seed(b"batch");
        let poisoned = XPrv::from_seed(b"poison").xpub();
        let signer = Flaky {
            key: key.clone(),
            poisoned,
        };
        let templates = vec![
            Template::new(tx(1)).require(0, poisoned, DerivationPath::root()),
            Template::new(tx(1)).require(0, key.xpub(), DerivationPath::root()),
            Template::new(tx(2)).require(1, poisoned, DerivationPath::root()),
            Template::new(tx(3)).require(2, key.xpub(), DerivationPath::root()),
        ];

        let formatter = ErrorFormatter::new();
        let coordinator = SigningCoordinator::new(&formatter);
        let results = coordinator.sign_batch(templates.clone(), &signer);

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].error().unwrap().code, "SC052");
        assert_eq!(results[2].error().unwrap().code, "SC052");
        for i in [1, 3] {
            let signed = results[i].template().unwrap();
            assert_eq!(signed.transaction, templates[i].transaction);
            assert_valid(signed);
        }
    }
}
