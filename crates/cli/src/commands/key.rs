//! Vault key management command.

use super::{coded, open_storage};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use sealchain_chain::ErrorFormatter;
use sealchain_core::XPub;
use sealchain_vault::{Vault, VaultConfig};
use std::path::{Path, PathBuf};

#[derive(Args)]
pub struct KeyArgs {
    /// Directory to store blockchain data
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: KeyCommand,
}

#[derive(Subcommand)]
enum KeyCommand {
    /// Generate a new root key under an alias
    Create {
        alias: String,

        #[arg(short, long)]
        password: String,
    },
    /// List stored keys
    List {
        /// Cursor returned by the previous page
        #[arg(short, long, default_value = "")]
        after: String,

        /// Page size (0 selects the default)
        #[arg(short, long, default_value = "0")]
        limit: usize,
    },
    /// Delete a key
    Delete {
        /// Extended public key (hex)
        xpub: String,

        #[arg(short, long)]
        password: String,
    },
    /// Re-encrypt a key under a new password
    ResetPassword {
        /// Extended public key (hex)
        xpub: String,

        #[arg(long)]
        old_password: String,

        #[arg(long)]
        new_password: String,
    },
}

pub fn run(args: KeyArgs, formatter: &ErrorFormatter) -> Result<()> {
    let vault = open_vault(&args.data_dir)?;
    match args.command {
        KeyCommand::Create { alias, password } => {
            let key = vault
                .create_key(&alias, &password)
                .map_err(|e| coded(formatter, e))?;
            println!("{}  Created key {}", "✓".green().bold(), key.alias.bold());
            println!("    XPub: {}", key.xpub.to_hex().bright_yellow());
        }
        KeyCommand::List { after, limit } => {
            let page = vault
                .list_keys(&after, limit)
                .map_err(|e| coded(formatter, e))?;
            println!();
            println!("{}", "Keys:".bold().cyan());
            println!();
            if page.items.is_empty() {
                println!("  {}", "(none)".bright_black());
            }
            for key in &page.items {
                println!(
                    "  {:<20} {}",
                    key.alias.bold(),
                    key.xpub.to_hex().bright_black()
                );
            }
            println!();
            if !page.last_page {
                println!("  Next page: --after {}", page.next.bright_cyan());
            }
        }
        KeyCommand::Delete { xpub, password } => {
            let xpub = parse_xpub(&xpub)?;
            vault
                .delete_key(&xpub, &password)
                .map_err(|e| coded(formatter, e))?;
            println!(
                "{}  Deleted key {}",
                "✓".green().bold(),
                xpub.to_hex().bright_black()
            );
        }
        KeyCommand::ResetPassword {
            xpub,
            old_password,
            new_password,
        } => {
            let xpub = parse_xpub(&xpub)?;
            vault
                .reset_password(&xpub, &old_password, &new_password)
                .map_err(|e| coded(formatter, e))?;
            println!("{}  Password updated", "✓".green().bold());
        }
    }
    Ok(())
}

pub(super) fn open_vault(data_dir: &Path) -> Result<Vault> {
    Ok(Vault::new(open_storage(data_dir)?, VaultConfig::default()))
}

pub(super) fn parse_xpub(s: &str) -> Result<XPub> {
    XPub::from_hex(s).with_context(|| format!("Invalid xpub: {}", s))
}
