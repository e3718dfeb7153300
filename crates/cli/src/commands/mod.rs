//! CLI commands module.

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use sealchain_chain::ErrorFormatter;
use sealchain_core::Coded;
use sealchain_storage::Storage;
use std::fs;
use std::path::Path;

mod block;
mod genesis;
mod key;
mod sign;

#[derive(Subcommand)]
pub enum Commands {
    /// Build, seal and store the genesis block
    Genesis(genesis::GenesisArgs),
    /// Vault key management
    Key(key::KeyArgs),
    /// Sign transaction templates
    Sign(sign::SignArgs),
    /// Inspect and verify stored blocks
    Block(block::BlockArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    let formatter = ErrorFormatter::new();
    match cmd {
        Commands::Genesis(args) => genesis::run(args, &formatter),
        Commands::Key(args) => key::run(args, &formatter),
        Commands::Sign(args) => sign::run(args, &formatter),
        Commands::Block(args) => block::run(args, &formatter),
    }
}

/// Open (creating if needed) the database under `data_dir`.
fn open_storage(data_dir: &Path) -> Result<Storage> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;
    Storage::open(data_dir).with_context(|| format!("Failed to open storage at {:?}", data_dir))
}

/// Render a coded error with its public code.
fn coded<E: Coded>(formatter: &ErrorFormatter, err: E) -> anyhow::Error {
    anyhow!("{}", formatter.format(&err))
}
