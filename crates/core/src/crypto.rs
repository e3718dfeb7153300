//! Hierarchical-deterministic ed25519 keys.
//!
//! An extended private key is an ed25519 scalar plus a 32-byte chain code;
//! the matching extended public key is the point `scalar * B` plus the same
//! chain code. Child derivation is additive:
//!
//! ```text
//! (f, c') = HMAC-SHA512(chain_code, "N" || point || component)
//! child scalar = scalar + f        child point = point + f * B
//! ```
//!
//! so a child public key can be derived from the parent public key alone and
//! always matches the public key of the privately derived child.

use curve25519_dalek::edwards::{CompressedEdwardsY, EdwardsPoint};
use curve25519_dalek::scalar::Scalar;
use ed25519_dalek::hazmat::{raw_sign, ExpandedSecretKey};
use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

type HmacSha512 = Hmac<Sha512>;

const ROOT_KEY: &[u8] = b"sealchain root key";
const NONCE_PREFIX_TAG: &[u8] = b"sealchain signing prefix";

/// Errors that can occur during key handling and signature checks.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid key encoding: {0}")]
    InvalidEncoding(String),
    #[error("signature verification failed")]
    VerificationFailed,
}

/// An ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut arr = [0u8; 64];
        hex::decode_to_slice(&s, &mut arr).map_err(serde::de::Error::custom)?;
        Ok(Self(arr))
    }
}

/// Ordered derivation path. Each component is an opaque byte string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DerivationPath(pub Vec<Vec<u8>>);

impl DerivationPath {
    /// The empty path; deriving along it returns the root unchanged.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from numeric indices, each encoded as 8 little-endian bytes.
    pub fn from_indices(indices: &[u64]) -> Self {
        Self(indices.iter().map(|i| i.to_le_bytes().to_vec()).collect())
    }

    pub fn components(&self) -> &[Vec<u8>] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn tweak(point: &[u8; 32], chain_code: &[u8; 32], component: &[u8]) -> (Scalar, [u8; 32]) {
    let mut mac =
        HmacSha512::new_from_slice(chain_code).expect("HMAC accepts keys of any length");
    mac.update(b"N");
    mac.update(point);
    mac.update(component);
    let out = mac.finalize().into_bytes();

    let mut f = Zeroizing::new([0u8; 32]);
    f.copy_from_slice(&out[..32]);
    let mut child_chain = [0u8; 32];
    child_chain.copy_from_slice(&out[32..]);
    (Scalar::from_bytes_mod_order(*f), child_chain)
}

/// Extended private key.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct XPrv {
    scalar: [u8; 32],
    chain_code: [u8; 32],
}

impl XPrv {
    /// Generate a fresh root key from OS randomness.
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; 64]);
        OsRng.fill_bytes(&mut seed[..]);
        Self::from_seed(&seed[..])
    }

    /// Deterministically derive a root key from seed material.
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut mac =
            HmacSha512::new_from_slice(ROOT_KEY).expect("HMAC accepts keys of any length");
        mac.update(seed);
        let out = mac.finalize().into_bytes();

        let mut wide = Zeroizing::new([0u8; 32]);
        wide.copy_from_slice(&out[..32]);
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&out[32..]);
        Self {
            scalar: Scalar::from_bytes_mod_order(*wide).to_bytes(),
            chain_code,
        }
    }

    /// Decode the 64-byte `scalar || chain_code` form.
    pub fn from_bytes(bytes: &[u8; 64]) -> Result<Self, CryptoError> {
        let mut scalar = [0u8; 32];
        scalar.copy_from_slice(&bytes[..32]);
        let canonical: Option<Scalar> = Scalar::from_canonical_bytes(scalar).into();
        if canonical.is_none() {
            return Err(CryptoError::InvalidPrivateKey);
        }
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&bytes[32..]);
        Ok(Self { scalar, chain_code })
    }

    pub fn to_bytes(&self) -> Zeroizing<[u8; 64]> {
        let mut out = Zeroizing::new([0u8; 64]);
        out[..32].copy_from_slice(&self.scalar);
        out[32..].copy_from_slice(&self.chain_code);
        out
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = Zeroizing::new([0u8; 64]);
        hex::decode_to_slice(s.trim(), &mut bytes[..])
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    fn scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.scalar)
    }

    /// The matching extended public key.
    pub fn xpub(&self) -> XPub {
        XPub {
            key: EdwardsPoint::mul_base(&self.scalar()).compress().to_bytes(),
            chain_code: self.chain_code,
        }
    }

    /// Derive the child key along `path`.
    pub fn derive(&self, path: &DerivationPath) -> XPrv {
        path.components()
            .iter()
            .fold(self.clone(), |parent, component| parent.child(component))
    }

    fn child(&self, component: &[u8]) -> XPrv {
        let public = self.xpub();
        let (f, chain_code) = tweak(&public.key, &self.chain_code, component);
        XPrv {
            scalar: (self.scalar() + f).to_bytes(),
            chain_code,
        }
    }

    /// Sign `message` with this key.
    pub fn sign(&self, message: &[u8]) -> Result<Signature, CryptoError> {
        let mut prefix = Sha512::new();
        prefix.update(NONCE_PREFIX_TAG);
        prefix.update(self.scalar);
        prefix.update(self.chain_code);
        let digest = prefix.finalize();

        let mut hash_prefix = [0u8; 32];
        hash_prefix.copy_from_slice(&digest[..32]);
        let expanded = ExpandedSecretKey {
            scalar: self.scalar(),
            hash_prefix,
        };
        let verifying_key = self.xpub().verifying_key()?;
        let signature = raw_sign::<Sha512>(&expanded, message, &verifying_key);
        hash_prefix.zeroize();
        Ok(Signature(signature.to_bytes()))
    }
}

impl fmt::Debug for XPrv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XPrv").field("xpub", &self.xpub()).finish()
    }
}

/// Extended public key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct XPub {
    key: [u8; 32],
    chain_code: [u8; 32],
}

impl XPub {
    pub fn from_bytes(bytes: &[u8; 64]) -> Result<Self, CryptoError> {
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes[..32]);
        if CompressedEdwardsY(key).decompress().is_none() {
            return Err(CryptoError::InvalidPublicKey);
        }
        let mut chain_code = [0u8; 32];
        chain_code.copy_from_slice(&bytes[32..]);
        Ok(Self { key, chain_code })
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.key);
        out[32..].copy_from_slice(&self.chain_code);
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 64];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// The compressed ed25519 point.
    pub fn public_key(&self) -> [u8; 32] {
        self.key
    }

    fn point(&self) -> Result<EdwardsPoint, CryptoError> {
        CompressedEdwardsY(self.key)
            .decompress()
            .ok_or(CryptoError::InvalidPublicKey)
    }

    fn verifying_key(&self) -> Result<VerifyingKey, CryptoError> {
        VerifyingKey::from_bytes(&self.key).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Derive the child public key along `path` without any private material.
    pub fn derive(&self, path: &DerivationPath) -> Result<XPub, CryptoError> {
        path.components()
            .iter()
            .try_fold(*self, |parent, component| parent.child(component))
    }

    fn child(&self, component: &[u8]) -> Result<XPub, CryptoError> {
        let (f, chain_code) = tweak(&self.key, &self.chain_code, component);
        let point = self.point()? + EdwardsPoint::mul_base(&f);
        Ok(XPub {
            key: point.compress().to_bytes(),
            chain_code,
        })
    }

    /// Verify `signature` over `message` against this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        let sig = DalekSignature::from_bytes(&signature.0);
        self.verifying_key()?
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for XPub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XPub({})", hex::encode(&self.key[..8]))
    }
}

impl fmt::Display for XPub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for XPub {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for XPub {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        XPub::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
