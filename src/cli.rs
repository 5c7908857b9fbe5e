use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mountaintops_bridge::config::BridgeConfig;
use mountaintops_bridge::error::BridgeError;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct CliArgs {
    /// JSON config file with walletUrl, explorerUrl, originator, requestTimeoutSecs
    #[clap(short, long, value_parser)]
    pub config: Option<PathBuf>,

    /// Wallet JSON endpoint, overrides the config file
    #[clap(long, value_parser)]
    pub wallet_url: Option<String>,

    /// Block explorer base URL, overrides the config file
    #[clap(long, value_parser)]
    pub explorer_url: Option<String>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the public bridge address of this wallet
    Address,
    /// Show the balance held at the bridge address
    Balance,
    /// Move every output at the bridge address into the wallet
    Import,
    /// Pay a legacy address from the wallet
    Send {
        /// Recipient P2PKH address
        #[clap(long)]
        to: String,
        /// Amount in BSV
        #[clap(long)]
        amount: f64,
    },
}

pub fn resolve_config(args: &CliArgs) -> Result<BridgeConfig, BridgeError> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(url) = &args.wallet_url {
        config.wallet_url = url.clone();
    }
    if let Some(url) = &args.explorer_url {
        config.explorer_url = url.clone();
    }
    Ok(config)
}
