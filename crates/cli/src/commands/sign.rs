//! Template signing command.

use super::key::{open_vault, parse_xpub};
use anyhow::{bail, Context, Result};
use clap::Args;
use sealchain_chain::{
    ErrorFormatter, InlineSigner, SignResult, SigningCoordinator, Template, VaultSigner,
};
use sealchain_core::XPrv;
use std::fs;
use std::path::PathBuf;

#[derive(Args)]
pub struct SignArgs {
    /// Directory to store blockchain data
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// JSON file holding an array of templates
    templates: PathBuf,

    /// Vault key to sign with (requires --password)
    #[arg(long, requires = "password", conflicts_with = "xprv")]
    xpub: Option<String>,

    #[arg(short, long)]
    password: Option<String>,

    /// Extended private key (hex) to sign with directly
    #[arg(long)]
    xprv: Option<String>,

    /// Write results here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub fn run(args: SignArgs, formatter: &ErrorFormatter) -> Result<()> {
    let contents = fs::read_to_string(&args.templates)
        .with_context(|| format!("Failed to read {:?}", args.templates))?;
    let templates: Vec<Template> =
        serde_json::from_str(&contents).context("Templates must be a JSON array")?;

    let coordinator = SigningCoordinator::new(formatter);
    let results: Vec<SignResult> = match (args.xpub, args.password, args.xprv) {
        (Some(xpub), Some(password), None) => {
            let vault = open_vault(&args.data_dir)?;
            let signer = VaultSigner::new(&vault, parse_xpub(&xpub)?, password);
            coordinator.sign_batch(templates, &signer)
        }
        (None, _, Some(xprv)) => {
            let xprv = XPrv::from_hex(&xprv).context("Invalid xprv")?;
            coordinator.sign_batch(templates, &InlineSigner::new(xprv))
        }
        _ => bail!("Pass either --xpub with --password, or --xprv"),
    };

    let json = serde_json::to_string_pretty(&results)?;
    match args.output {
        Some(path) => {
            fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?
        }
        None => println!("{}", json),
    }
    Ok(())
}
