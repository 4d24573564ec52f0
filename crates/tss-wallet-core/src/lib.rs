//! # TSS Wallet Core
//!
//! Cryptographic core of a multi-device threshold-signing wallet. The
//! threshold engine itself is external; this crate turns its inputs and
//! outputs into blockchain transactions.
//!
//! ## Architecture
//!
//! This crate provides:
//! - **Public Key Derivation**: non-hardened BIP32 child keys and per-chain
//!   address encodings from the vault's root public key + chain code
//! - **Signature Assembly**: DER / recoverable / raw extraction from engine
//!   signature shares, with mandatory verification before use
//! - **Transaction Compilers**: one per chain family (UTXO, EVM, Cosmos,
//!   Solana, Sui, TON, Polkadot), behind a common build → preimages → compile
//!   contract and a registry keyed by chain
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tss_wallet_core::{Chain, ChainSpecificFee, Coin, SigningPayload};
//! use tss_wallet_core::compiler::CompilerRegistry;
//!
//! let registry = CompilerRegistry::standard();
//! let compiler = registry.for_chain(Chain::Ethereum)?;
//!
//! let payload = SigningPayload::new(coin, "0x...", amount, fee);
//! let unsigned = compiler.build_unsigned(&payload)?;
//! let preimages = compiler.preimage_hashes(&unsigned)?;
//!
//! // hand `preimages` to the threshold engine, collect shares, then:
//! let raw_tx_hex = compiler.compile_signed(&unsigned, &shares, &public_key)?;
//! ```
//!
//! ## Security Model
//!
//! No signature is embedded into a transaction without being verified against
//! the derived public key and the exact preimage it claims to sign. A failed
//! verification is terminal for the signing session: it means a stale
//! unsigned transaction, a corrupted relay message or a mismatched key.

pub mod compiler;
pub mod error;
pub mod keys;
pub mod signature;
pub mod types;

pub use compiler::{CompilerRegistry, TxCompiler, UnsignedTx};
pub use error::{Error, Result};
pub use keys::{address_from_public_key, derive_address, derive_child_public_key, eddsa_public_key};
pub use signature::{signature_for, SignatureEncoding, SignatureShares};
pub use types::{
    Chain, ChainFamily, ChainSpecificFee, Coin, SignatureAlgorithm, SignatureShare,
    SigningPayload, UnspentOutput,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
