//! TSS Wallet CLI
//!
//! Command-line tool for inspecting vault keys: derive per-chain public keys
//! and addresses from a vault's root public keys, and list supported chains.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tss_wallet_core::{
    derive_address, derive_child_public_key, eddsa_public_key, Chain, SignatureAlgorithm,
};

#[derive(Parser)]
#[command(name = "tss-wallet")]
#[command(about = "Threshold-signing wallet key inspector", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive the receive address for a chain
    Address {
        /// Chain name (e.g. bitcoin, ethereum, solana)
        chain: String,

        /// Vault root public key, hex (compressed secp256k1 or ed25519)
        #[arg(short, long)]
        public_key: String,

        /// Vault chain code, hex (required for ECDSA chains)
        #[arg(short, long, default_value = "")]
        chain_code: String,
    },

    /// Derive the chain-level public key
    Pubkey {
        /// Chain name
        chain: String,

        /// Vault root public key, hex
        #[arg(short, long)]
        public_key: String,

        /// Vault chain code, hex (required for ECDSA chains)
        #[arg(short, long, default_value = "")]
        chain_code: String,
    },

    /// List supported chains
    Info,
}

fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_max_level(Level::WARN)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Address {
            chain,
            public_key,
            chain_code,
        } => {
            let chain = parse_chain(&chain)?;
            let address = derive_address(&public_key, &chain_code, chain)?;
            println!("{address}");
        }
        Commands::Pubkey {
            chain,
            public_key,
            chain_code,
        } => {
            let chain = parse_chain(&chain)?;
            let derived = match chain.signature_algorithm() {
                SignatureAlgorithm::Ecdsa => {
                    derive_child_public_key(&public_key, &chain_code, chain.derivation_path())?
                }
                SignatureAlgorithm::Eddsa => hex::encode(eddsa_public_key(&public_key, chain)?),
            };
            println!("{derived}");
        }
        Commands::Info => {
            show_info()?;
        }
    }

    Ok(())
}

fn parse_chain(name: &str) -> Result<Chain> {
    match name.parse::<Chain>() {
        Ok(chain) => Ok(chain),
        Err(_) => bail!(
            "unknown chain '{name}', run `tss-wallet info` for the supported list"
        ),
    }
}

fn show_info() -> Result<()> {
    let chains: Vec<_> = Chain::ALL
        .iter()
        .map(|chain| {
            serde_json::json!({
                "chain": chain.to_string(),
                "family": chain.family(),
                "algorithm": match chain.signature_algorithm() {
                    SignatureAlgorithm::Ecdsa => "ecdsa",
                    SignatureAlgorithm::Eddsa => "eddsa",
                },
                "derivation_path": chain.derivation_path(),
                "ticker": chain.ticker(),
                "decimals": chain.decimals(),
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&chains)?);
    Ok(())
}
