//! Block assembly and transaction authorization for sealchain.
//!
//! This crate ties the lower layers together:
//! - **Genesis**: builds and seals the first block from network constants
//! - **Verification**: re-derives a block's commitment and checks its seal
//! - **Signing**: fills transaction templates from an inline key or the vault
//! - **Errors**: renders stable error codes for the boundary layer
//!
//! # Example
//!
//! ```rust,no_run
//! use sealchain_chain::{build_genesis, verify_block, GenesisParams};
//! use sealchain_consensus::{CancelToken, Sealer};
//! use sealchain_core::CanonicalHeaderHasher;
//! use sealchain_storage::StateSnapshot;
//!
//! let params = GenesisParams::mainnet();
//! let genesis = build_genesis(&params, &Sealer::default(), &CancelToken::new()).unwrap();
//!
//! let empty = StateSnapshot::empty();
//! let state = verify_block(&genesis.block, &empty, &CanonicalHeaderHasher).unwrap();
//! assert_eq!(state.root_hash(), genesis.state.root_hash());
//! ```

pub mod errors;
pub mod genesis;
pub mod signer;
pub mod template;
pub mod verify;

// Re-export commonly used types
pub use errors::{ErrorEntry, ErrorFormatter};
pub use genesis::{
    build_genesis, genesis_template, genesis_tx, Genesis, GenesisError, GenesisParams,
    NATIVE_ASSET,
};
pub use signer::{
    sign_template, InlineSigner, SignError, SignOutcome, SignResult, Signer, SigningCoordinator,
    VaultSigner,
};
pub use template::{KeyPath, SigningInstruction, Template};
pub use verify::{verify_block, CommitmentField, VerifyError};
