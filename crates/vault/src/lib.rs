//! Encrypted HD key vault for sealchain.
//!
//! Root keys are generated inside the vault, stored under unique aliases and
//! never leave it unencrypted. Callers sign by extended public key plus
//! password, optionally along a derivation path.
//!
//! # Example
//!
//! ```rust
//! use sealchain_core::DerivationPath;
//! use sealchain_storage::Storage;
//! use sealchain_vault::{KdfParams, Vault, VaultConfig};
//!
//! let config = VaultConfig { kdf: KdfParams::insecure_fast(), ..VaultConfig::default() };
//! let vault = Vault::new(Storage::open_temporary().unwrap(), config);
//!
//! let key = vault.create_key("treasury", "correct horse").unwrap();
//! let sig = vault
//!     .sign(&key.xpub, &DerivationPath::root(), b"digest", "correct horse")
//!     .unwrap();
//! assert!(key.xpub.verify(b"digest", &sig).is_ok());
//! ```

pub mod envelope;
pub mod error;
mod locks;
pub mod vault;

pub use envelope::{KdfParams, SealedSecret};
pub use error::{Result, VaultError};
pub use vault::{normalize_alias, KeyInfo, KeyPage, Vault, VaultConfig};
