//! Password-based encryption of private key material.
//!
//! The password is stretched with Argon2id into a 256-bit key, which seals
//! the secret with XChaCha20-Poly1305. Salt, nonce and KDF cost travel with
//! the ciphertext so old records stay readable when defaults change.

use crate::error::{Result, VaultError};
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Minimum cost Argon2 accepts. Only for tests and throwaway vaults.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    fn derive_key(&self, password: &str, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| VaultError::Kdf(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut key[..])
            .map_err(|e| VaultError::Kdf(e.to_string()))?;
        Ok(key)
    }
}

/// A secret encrypted under a password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSecret {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
    ciphertext: Vec<u8>,
    kdf: KdfParams,
}

impl std::fmt::Debug for SealedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealedSecret")
            .field("kdf", &self.kdf)
            .field("len", &self.ciphertext.len())
            .finish()
    }
}

impl SealedSecret {
    /// Encrypt `secret` under `password` with a fresh salt and nonce.
    pub fn seal(secret: &[u8], password: &str, kdf: KdfParams) -> Result<Self> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        rng.fill_bytes(&mut salt);
        rng.fill_bytes(&mut nonce);

        let key = kdf.derive_key(password, &salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), secret)
            .map_err(|_| VaultError::Encryption)?;

        Ok(Self {
            salt,
            nonce,
            ciphertext,
            kdf,
        })
    }

    /// Decrypt with `password`. Any authentication failure is reported as a
    /// bad password.
    pub fn open(&self, password: &str) -> Result<Zeroizing<Vec<u8>>> {
        let key = self.kdf.derive_key(password, &self.salt)?;
        let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
        cipher
            .decrypt(XNonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| VaultError::Auth)
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }
}
