//! Core data model shared by the key-derivation, signature-assembly and
//! transaction-compiler layers.
//!
//! The central types are [`Chain`] (a closed set of supported networks),
//! [`SigningPayload`] (a chain-agnostic description of a transfer to sign)
//! and [`ChainSpecificFee`] (a tagged union of per-family fee/sequence
//! parameters). Compilers pattern-match on the fee variant exhaustively, so
//! handing e.g. an EVM fee to the UTXO compiler is rejected with a typed
//! error instead of producing garbage bytes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============ Chains ============

/// Supported networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chain {
    Bitcoin,
    BitcoinCash,
    Litecoin,
    Dogecoin,
    Dash,
    Ethereum,
    Avalanche,
    BscChain,
    ThorChain,
    GaiaChain,
    Solana,
    Sui,
    Ton,
    Polkadot,
}

/// Transaction-format family a chain belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    Utxo,
    Evm,
    Cosmos,
    Solana,
    Sui,
    Ton,
    Polkadot,
}

/// Signature scheme used by a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    Ecdsa,
    Eddsa,
}

impl Chain {
    /// All supported chains
    pub const ALL: [Chain; 14] = [
        Chain::Bitcoin,
        Chain::BitcoinCash,
        Chain::Litecoin,
        Chain::Dogecoin,
        Chain::Dash,
        Chain::Ethereum,
        Chain::Avalanche,
        Chain::BscChain,
        Chain::ThorChain,
        Chain::GaiaChain,
        Chain::Solana,
        Chain::Sui,
        Chain::Ton,
        Chain::Polkadot,
    ];

    pub fn family(&self) -> ChainFamily {
        match self {
            Chain::Bitcoin | Chain::BitcoinCash | Chain::Litecoin | Chain::Dogecoin
            | Chain::Dash => ChainFamily::Utxo,
            Chain::Ethereum | Chain::Avalanche | Chain::BscChain => ChainFamily::Evm,
            Chain::ThorChain | Chain::GaiaChain => ChainFamily::Cosmos,
            Chain::Solana => ChainFamily::Solana,
            Chain::Sui => ChainFamily::Sui,
            Chain::Ton => ChainFamily::Ton,
            Chain::Polkadot => ChainFamily::Polkadot,
        }
    }

    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self.family() {
            ChainFamily::Utxo | ChainFamily::Evm | ChainFamily::Cosmos => {
                SignatureAlgorithm::Ecdsa
            }
            ChainFamily::Solana | ChainFamily::Sui | ChainFamily::Ton
            | ChainFamily::Polkadot => SignatureAlgorithm::Eddsa,
        }
    }

    /// Fixed derivation path used for the chain's child key.
    ///
    /// EdDSA chains carry no HD derivation in this wallet model; their path
    /// is informational only (the root key is used directly).
    pub fn derivation_path(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "m/84'/0'/0'/0/0",
            Chain::BitcoinCash => "m/44'/145'/0'/0/0",
            Chain::Litecoin => "m/84'/2'/0'/0/0",
            Chain::Dogecoin => "m/44'/3'/0'/0/0",
            Chain::Dash => "m/44'/5'/0'/0/0",
            Chain::Ethereum | Chain::Avalanche | Chain::BscChain => "m/44'/60'/0'/0/0",
            Chain::ThorChain => "m/44'/931'/0'/0/0",
            Chain::GaiaChain => "m/44'/118'/0'/0/0",
            Chain::Solana => "m/44'/501'/0'/0'",
            Chain::Sui => "m/44'/784'/0'/0'/0'",
            Chain::Ton => "m/44'/607'/0'",
            Chain::Polkadot => "m/44'/354'/0'/0'/0'",
        }
    }

    /// EIP-155 chain ID for EVM members
    pub fn evm_chain_id(&self) -> Option<u64> {
        match self {
            Chain::Ethereum => Some(1),
            Chain::Avalanche => Some(43114),
            Chain::BscChain => Some(56),
            _ => None,
        }
    }

    pub fn ticker(&self) -> &'static str {
        match self {
            Chain::Bitcoin => "BTC",
            Chain::BitcoinCash => "BCH",
            Chain::Litecoin => "LTC",
            Chain::Dogecoin => "DOGE",
            Chain::Dash => "DASH",
            Chain::Ethereum => "ETH",
            Chain::Avalanche => "AVAX",
            Chain::BscChain => "BNB",
            Chain::ThorChain => "RUNE",
            Chain::GaiaChain => "ATOM",
            Chain::Solana => "SOL",
            Chain::Sui => "SUI",
            Chain::Ton => "TON",
            Chain::Polkadot => "DOT",
        }
    }

    /// Base-unit decimals of the native coin
    pub fn decimals(&self) -> u32 {
        match self {
            Chain::Bitcoin | Chain::BitcoinCash | Chain::Litecoin | Chain::Dogecoin
            | Chain::Dash | Chain::ThorChain => 8,
            Chain::Ethereum | Chain::Avalanche | Chain::BscChain => 18,
            Chain::GaiaChain => 6,
            Chain::Solana | Chain::Ton | Chain::Sui => 9,
            Chain::Polkadot => 10,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Chain::Bitcoin => "Bitcoin",
            Chain::BitcoinCash => "BitcoinCash",
            Chain::Litecoin => "Litecoin",
            Chain::Dogecoin => "Dogecoin",
            Chain::Dash => "Dash",
            Chain::Ethereum => "Ethereum",
            Chain::Avalanche => "Avalanche",
            Chain::BscChain => "BscChain",
            Chain::ThorChain => "ThorChain",
            Chain::GaiaChain => "GaiaChain",
            Chain::Solana => "Solana",
            Chain::Sui => "Sui",
            Chain::Ton => "Ton",
            Chain::Polkadot => "Polkadot",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Chain {
    type Err = Error;

    /// Parses canonical names plus the common aliases seen in payloads
    /// produced by older wallet generations.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bitcoin" | "btc" => Ok(Chain::Bitcoin),
            "bitcoincash" | "bitcoin-cash" | "bch" => Ok(Chain::BitcoinCash),
            "litecoin" | "ltc" => Ok(Chain::Litecoin),
            "dogecoin" | "doge" => Ok(Chain::Dogecoin),
            "dash" => Ok(Chain::Dash),
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "avalanche" | "avax" => Ok(Chain::Avalanche),
            "bsc" | "bscchain" | "bnb" | "smartchain" => Ok(Chain::BscChain),
            "thorchain" | "thor" | "rune" => Ok(Chain::ThorChain),
            "gaiachain" | "cosmos" | "atom" => Ok(Chain::GaiaChain),
            "solana" | "sol" => Ok(Chain::Solana),
            "sui" => Ok(Chain::Sui),
            "ton" => Ok(Chain::Ton),
            "polkadot" | "dot" => Ok(Chain::Polkadot),
            other => Err(Error::UnsupportedChain(other.to_string())),
        }
    }
}

// ============ Coins & Payloads ============

/// A spendable asset on a chain: native coin or token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub chain: Chain,
    pub ticker: String,
    /// Sender address on this chain
    pub address: String,
    /// Hex-encoded public key backing `address` (compressed secp256k1 or
    /// 32-byte ed25519, per chain)
    pub hex_public_key: String,
    pub decimals: u32,
    /// Token contract address; `None` for native coins
    pub contract_address: Option<String>,
}

impl Coin {
    /// Native coin of `chain` held at `address`
    pub fn native(chain: Chain, address: impl Into<String>, hex_public_key: impl Into<String>) -> Self {
        Self {
            chain,
            ticker: chain.ticker().to_string(),
            address: address.into(),
            hex_public_key: hex_public_key.into(),
            decimals: chain.decimals(),
            contract_address: None,
        }
    }

    /// Token on `chain` (e.g. an ERC-20)
    pub fn token(
        chain: Chain,
        ticker: impl Into<String>,
        address: impl Into<String>,
        hex_public_key: impl Into<String>,
        decimals: u32,
        contract_address: impl Into<String>,
    ) -> Self {
        Self {
            chain,
            ticker: ticker.into(),
            address: address.into(),
            hex_public_key: hex_public_key.into(),
            decimals,
            contract_address: Some(contract_address.into()),
        }
    }

    pub fn is_token(&self) -> bool {
        self.contract_address.is_some()
    }
}

/// An unspent output consumed by a UTXO-family transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// 32-byte transaction id, big-endian display order
    #[serde(with = "hex_bytes32")]
    pub hash: [u8; 32],
    /// Value in satoshi
    pub amount: u64,
    /// Output position within the funding transaction
    pub index: u32,
}

impl UnspentOutput {
    pub fn new(hash: [u8; 32], amount: u64, index: u32) -> Self {
        Self { hash, amount, index }
    }

    /// Parse the txid from its usual big-endian hex form
    pub fn from_hex(hash_hex: &str, amount: u64, index: u32) -> Result<Self> {
        let bytes = hex::decode(hash_hex)?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::InvalidPayload("utxo hash must be 32 bytes".to_string()))?;
        Ok(Self { hash, amount, index })
    }
}

mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

/// Per-family fee and sequencing parameters.
///
/// Exactly one variant is valid for a given payload; each compiler matches
/// its own variant and returns [`Error::InvalidPayload`] for the rest.
/// Externally tagged on the wire (`{"evm": {...}}`); internal tagging would
/// route the u128 fee fields through serde's buffering, which has no u128
/// support.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainSpecificFee {
    Utxo {
        /// Fee rate in satoshi per vbyte
        byte_fee: u64,
        /// Spend all inputs, no change output
        send_max: bool,
    },
    Evm {
        /// Max fee per gas, in wei
        max_fee_per_gas: u128,
        /// Max priority fee per gas, in wei
        priority_fee: u128,
        nonce: u64,
        gas_limit: u64,
    },
    Cosmos {
        account_number: u64,
        sequence: u64,
        /// Gas limit; the network fee itself is fixed per chain
        gas: u64,
    },
    Solana {
        /// Base58-encoded recent blockhash
        recent_blockhash: String,
    },
    Sui {
        reference_gas_price: u64,
        gas_budget: u64,
        /// Gas-payment object: (object id hex, version, digest base58)
        gas_object: (String, u64, String),
    },
    Ton {
        /// Wallet seqno fetched from chain state
        sequence_number: u32,
        /// Unix expiry timestamp for the external message
        expire_at: u64,
    },
    Polkadot {
        recent_block_hash: String,
        nonce: u64,
        current_block_number: u64,
        spec_version: u32,
        transaction_version: u32,
        genesis_hash: String,
    },
}

/// Chain-agnostic description of a transfer to sign.
///
/// Constructed by the caller immediately before a signing session starts and
/// treated as immutable for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningPayload {
    pub coin: Coin,
    pub to_address: String,
    /// Amount in base units
    pub amount: u128,
    pub memo: Option<String>,
    pub fee: ChainSpecificFee,
    /// Inputs to spend; only meaningful for UTXO chains
    #[serde(default)]
    pub utxos: Vec<UnspentOutput>,
}

impl SigningPayload {
    pub fn new(coin: Coin, to_address: impl Into<String>, amount: u128, fee: ChainSpecificFee) -> Self {
        Self {
            coin,
            to_address: to_address.into(),
            amount,
            memo: None,
            fee,
            utxos: Vec::new(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_utxos(mut self, utxos: Vec<UnspentOutput>) -> Self {
        self.utxos = utxos;
        self
    }
}

// ============ Signature Shares ============

/// Per-preimage signature produced by the threshold engine.
///
/// All fields are hex strings, matching the engine's keysign response wire
/// shape. `recovery_id` is `"00"`/`"01"` for ECDSA; for EdDSA chains the
/// 64-byte signature is `r || s` and the remaining fields are unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureShare {
    /// Hex of the preimage this share signs
    pub msg: String,
    pub r: String,
    pub s: String,
    pub der_signature: String,
    pub recovery_id: String,
}

impl SignatureShare {
    /// Raw 64-byte `r || s` signature
    pub fn raw_bytes(&self) -> Result<Vec<u8>> {
        let r = hex::decode(&self.r)?;
        let s = hex::decode(&self.s)?;
        if r.len() != 32 || s.len() != 32 {
            return Err(Error::InvalidSignature(format!(
                "r/s must be 32 bytes, got {}/{}",
                r.len(),
                s.len()
            )));
        }
        let mut out = r;
        out.extend_from_slice(&s);
        Ok(out)
    }
}
