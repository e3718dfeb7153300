//! Storage and state commitments for sealchain.
//!
//! - [`StateSnapshot`]: immutable, versioned state over unspent outputs
//! - [`ChainStore`]: sealed blocks by hash and height
//! - [`Storage`]: sled wrapper with bincode helpers, shared with the key vault
//!
//! # Example
//!
//! ```rust
//! use sealchain_core::{AssetId, Transaction, TxOutput};
//! use sealchain_storage::StateSnapshot;
//!
//! let coinbase = Transaction::new(vec![], vec![TxOutput::new(AssetId::new([1; 32]), 10, vec![0x51])]);
//! let state = StateSnapshot::empty().apply_tx(&coinbase).unwrap();
//! assert_ne!(state.root_hash(), StateSnapshot::empty().root_hash());
//! ```

pub mod chain;
pub mod db;
pub mod state;

pub use chain::ChainStore;
pub use db::{Entry, Result, Storage, StorageError};
pub use state::{OutputEntry, StateError, StateSnapshot};
