//! Block operations command.

use super::{coded, open_storage};
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use sealchain_chain::{verify_block, ErrorFormatter};
use sealchain_core::{Block, CanonicalHeaderHasher, Hash};
use sealchain_storage::{ChainStore, StateSnapshot, Storage};
use std::path::PathBuf;

#[derive(Args)]
pub struct BlockArgs {
    #[command(subcommand)]
    command: BlockCommand,
}

#[derive(Subcommand)]
enum BlockCommand {
    /// List recent blocks
    List {
        /// Directory to store blockchain data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Number of blocks to show
        #[arg(short, long, default_value = "10")]
        count: u64,
    },
    /// Show detailed block information
    Info {
        /// Directory to store blockchain data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,

        /// Block height or hash (hex format)
        block_id: String,
    },
    /// Replay the chain from genesis, re-deriving every commitment and seal
    Verify {
        /// Directory to store blockchain data
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

pub fn run(args: BlockArgs, formatter: &ErrorFormatter) -> Result<()> {
    match args.command {
        BlockCommand::List { data_dir, count } => list_blocks(data_dir, count),
        BlockCommand::Info { data_dir, block_id } => show_block_info(data_dir, block_id),
        BlockCommand::Verify { data_dir } => verify_chain(data_dir, formatter),
    }
}

/// Genesis height and head height of an initialized chain.
fn chain_bounds(chain: &ChainStore) -> Result<(u64, u64)> {
    let genesis = chain
        .get_genesis()?
        .context("Chain not initialized. Did you run 'sealchain genesis'?")?;
    let head = chain.get_height()?.context("Missing chain height")?;
    Ok((genesis.height(), head))
}

fn list_blocks(data_dir: PathBuf, count: u64) -> Result<()> {
    let storage = open_storage(&data_dir)?;
    let chain = ChainStore::new(&storage);
    let (first, head) = chain_bounds(&chain)?;

    println!();
    println!("{}", "Recent Blocks:".bold().cyan());
    println!();

    let start = head.saturating_sub(count.saturating_sub(1)).max(first);
    for height in (start..=head).rev() {
        let block = chain
            .get_block_by_height(height)?
            .context("Block not found")?;

        println!(
            "  {} {} {}",
            format!("#{}", height).bright_black(),
            block.hash().to_hex()[..16].bright_yellow(),
            format!("({} txs)", block.tx_count()).bright_black()
        );
    }

    println!();
    Ok(())
}

fn load_block(storage: &Storage, block_id: &str) -> Result<Block> {
    let chain = ChainStore::new(storage);
    let block = if let Ok(height) = block_id.parse::<u64>() {
        chain.get_block_by_height(height)?
    } else {
        let hash = Hash::from_hex(block_id)
            .with_context(|| format!("Invalid block hash: {}", block_id))?;
        chain.get_block_by_hash(&hash)?
    };
    block.context("Block not found")
}

fn show_block_info(data_dir: PathBuf, block_id: String) -> Result<()> {
    let storage = open_storage(&data_dir)?;
    let block = load_block(&storage, &block_id)?;
    let header = &block.header;

    println!();
    println!("{}", "Block Information:".bold().cyan());
    println!();
    println!(
        "  Height:       {}",
        header.height.to_string().bright_cyan()
    );
    println!("  Hash:         {}", block.hash().to_hex().bright_yellow());
    println!(
        "  Parent Hash:  {}",
        header.previous_block_hash.to_hex().bright_black()
    );
    println!(
        "  Tx Root:      {}",
        header.commitment.transactions_root.to_hex().bright_black()
    );
    println!(
        "  State Root:   {}",
        header.commitment.state_root.to_hex().bright_black()
    );
    println!(
        "  Timestamp:    {}",
        header.timestamp_ms.to_string().bright_black()
    );
    println!(
        "  Bits:         {}",
        format!("{:#018x}", header.bits).bright_black()
    );
    println!("  Nonce:        {}", header.nonce.to_string().bright_cyan());
    println!(
        "  Transactions: {}",
        block.tx_count().to_string().bright_cyan()
    );
    println!();

    if !block.transactions.is_empty() {
        println!("{}", "Transactions:".bold());
        println!();
        for (i, id) in block.tx_ids().iter().enumerate() {
            println!(
                "  {} {}",
                format!("{}.", i + 1).bright_black(),
                id.to_hex()[..16].bright_yellow()
            );
        }
        println!();
    }

    Ok(())
}

fn verify_chain(data_dir: PathBuf, formatter: &ErrorFormatter) -> Result<()> {
    let storage = open_storage(&data_dir)?;
    let chain = ChainStore::new(&storage);
    let (first, head) = chain_bounds(&chain)?;

    let mut state = StateSnapshot::empty();
    let mut parent = Hash::ZERO;
    for height in first..=head {
        let block = chain
            .get_block_by_height(height)?
            .with_context(|| format!("Block {} missing", height))?;
        if block.header.previous_block_hash != parent {
            bail!("Block {} does not link to its parent", height);
        }
        state = verify_block(&block, &state, &CanonicalHeaderHasher)
            .map_err(|e| coded(formatter, e))
            .with_context(|| format!("Block {} failed verification", height))?;
        parent = block.hash();
    }

    println!(
        "{}  Verified {} block(s), state root {}",
        "✓".green().bold(),
        head - first + 1,
        state.root_hash().to_hex().bright_yellow()
    );
    Ok(())
}
