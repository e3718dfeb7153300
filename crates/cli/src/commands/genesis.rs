//! Genesis command.

use super::{coded, open_storage};
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use sealchain_chain::{build_genesis, ErrorFormatter, GenesisParams};
use sealchain_consensus::{CancelToken, SealConfig, Sealer};
use sealchain_storage::ChainStore;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Args)]
pub struct GenesisArgs {
    /// Directory to store blockchain data
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Sealing threads (defaults to the number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Give up sealing after this many seconds
    #[arg(short, long)]
    timeout: Option<u64>,
}

pub fn run(args: GenesisArgs, formatter: &ErrorFormatter) -> Result<()> {
    let storage = open_storage(&args.data_dir)?;
    let chain = ChainStore::new(&storage);
    if let Some(existing) = chain.get_genesis()? {
        bail!(
            "Chain already initialized with genesis {}",
            existing.hash().to_hex()
        );
    }

    let mut config = SealConfig::default();
    if let Some(workers) = args.workers {
        config = config.with_workers(workers);
    }
    if let Some(secs) = args.timeout {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    println!("{}", "Sealing genesis block...".bold().cyan());
    println!("  Workers: {}", config.workers.to_string().bright_black());

    let params = GenesisParams::mainnet();
    let genesis = build_genesis(&params, &Sealer::new(config), &CancelToken::new())
        .map_err(|e| coded(formatter, e))?;
    chain.init_genesis(&genesis.block)?;

    let header = &genesis.block.header;
    println!();
    println!("{}  Created genesis block", "✓".green().bold());
    println!(
        "    Hash:       {}",
        genesis.block.hash().to_hex().bright_yellow()
    );
    println!(
        "    Height:     {}",
        header.height.to_string().bright_cyan()
    );
    println!("    Nonce:      {}", header.nonce.to_string().bright_cyan());
    println!(
        "    Tx Root:    {}",
        header.commitment.transactions_root.to_hex().bright_black()
    );
    println!(
        "    State Root: {}",
        header.commitment.state_root.to_hex().bright_black()
    );
    println!();

    Ok(())
}
