//! Chain transaction compilers.
//!
//! Each family implements [`TxCompiler`], a three-step contract:
//!
//! 1. `build_unsigned` validates a [`SigningPayload`] against the family and
//!    constructs the family-native unsigned transaction;
//! 2. `preimage_hashes` extracts the byte sequences the threshold engine must
//!    sign (one for account-model chains, one per input for UTXO chains);
//! 3. `compile_signed` fetches a verified signature for every preimage and
//!    serializes the broadcast-ready transaction as hex.
//!
//! Compilers are registered per [`ChainFamily`] in a [`CompilerRegistry`];
//! callers look them up by [`Chain`] and never name a concrete compiler type.

use crate::signature::SignatureShares;
use crate::{Chain, ChainFamily, Error, Result, SigningPayload};
use std::collections::HashMap;

pub mod cosmos;
pub mod evm;
pub mod polkadot;
pub mod solana;
pub mod sui;
pub mod ton;
pub mod utxo;

pub use cosmos::CosmosCompiler;
pub use evm::EvmCompiler;
pub use polkadot::PolkadotCompiler;
pub use solana::SolanaCompiler;
pub use sui::SuiCompiler;
pub use ton::TonCompiler;
pub use utxo::UtxoCompiler;

/// Family-native unsigned transaction, opaque to everything but the compiler
/// that produced it
#[derive(Debug, Clone)]
pub enum UnsignedTx {
    Utxo(utxo::UnsignedUtxoTx),
    Evm(evm::UnsignedEvmTx),
    Cosmos(cosmos::UnsignedCosmosTx),
    Solana(solana::UnsignedSolanaTx),
    Sui(sui::UnsignedSuiTx),
    Ton(ton::UnsignedTonTx),
    Polkadot(polkadot::UnsignedPolkadotTx),
}

impl UnsignedTx {
    pub fn family(&self) -> ChainFamily {
        match self {
            UnsignedTx::Utxo(_) => ChainFamily::Utxo,
            UnsignedTx::Evm(_) => ChainFamily::Evm,
            UnsignedTx::Cosmos(_) => ChainFamily::Cosmos,
            UnsignedTx::Solana(_) => ChainFamily::Solana,
            UnsignedTx::Sui(_) => ChainFamily::Sui,
            UnsignedTx::Ton(_) => ChainFamily::Ton,
            UnsignedTx::Polkadot(_) => ChainFamily::Polkadot,
        }
    }
}

/// Compiler contract implemented once per chain family
pub trait TxCompiler: Send + Sync {
    /// Family this compiler serves
    fn family(&self) -> ChainFamily;

    /// Validate the payload and construct the unsigned transaction
    fn build_unsigned(&self, payload: &SigningPayload) -> Result<UnsignedTx>;

    /// Byte sequences the engine must sign for this transaction
    fn preimage_hashes(&self, unsigned: &UnsignedTx) -> Result<Vec<Vec<u8>>>;

    /// Attach verified signatures and serialize the broadcast-ready
    /// transaction as hex
    fn compile_signed(
        &self,
        unsigned: &UnsignedTx,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String>;
}

/// Shared payload guard: the payload's chain must belong to `family`.
pub(crate) fn check_family(payload: &SigningPayload, family: ChainFamily) -> Result<()> {
    if payload.coin.chain.family() != family {
        return Err(Error::InvalidPayload(format!(
            "chain {} does not belong to the {:?} family",
            payload.coin.chain, family
        )));
    }
    Ok(())
}

/// Shared envelope guard used by `preimage_hashes`/`compile_signed`.
macro_rules! expect_unsigned {
    ($unsigned:expr, $variant:ident) => {
        match $unsigned {
            crate::compiler::UnsignedTx::$variant(tx) => Ok(tx),
            other => Err(crate::Error::InvalidPayload(format!(
                "expected a {:?} transaction, got {:?}",
                crate::ChainFamily::$variant,
                other.family()
            ))),
        }
    };
}
pub(crate) use expect_unsigned;

/// Registry of compilers keyed by chain family
pub struct CompilerRegistry {
    compilers: HashMap<ChainFamily, Box<dyn TxCompiler>>,
}

impl CompilerRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            compilers: HashMap::new(),
        }
    }

    /// Registry with all built-in families
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(UtxoCompiler::new()));
        registry.register(Box::new(EvmCompiler::new()));
        registry.register(Box::new(CosmosCompiler::new()));
        registry.register(Box::new(SolanaCompiler::new()));
        registry.register(Box::new(SuiCompiler::new()));
        registry.register(Box::new(TonCompiler::new()));
        registry.register(Box::new(PolkadotCompiler::new()));
        registry
    }

    /// Register or replace the compiler for its family
    pub fn register(&mut self, compiler: Box<dyn TxCompiler>) {
        self.compilers.insert(compiler.family(), compiler);
    }

    /// Compiler serving `chain`
    pub fn for_chain(&self, chain: Chain) -> Result<&dyn TxCompiler> {
        self.compilers
            .get(&chain.family())
            .map(|c| c.as_ref())
            .ok_or_else(|| Error::UnsupportedChain(chain.to_string()))
    }

    /// Build, sign and serialize in one pass (all shares already available)
    pub fn compile(
        &self,
        payload: &SigningPayload,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        let compiler = self.for_chain(payload.coin.chain)?;
        let unsigned = compiler.build_unsigned(payload)?;
        compiler.compile_signed(&unsigned, shares, public_key)
    }
}

impl Default for CompilerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChainSpecificFee, Coin};

    #[test]
    fn test_standard_registry_covers_all_chains() {
        let registry = CompilerRegistry::standard();
        for chain in Chain::ALL {
            assert!(registry.for_chain(chain).is_ok(), "missing {chain}");
        }
    }

    #[test]
    fn test_family_mismatch_rejected() {
        let registry = CompilerRegistry::standard();
        let coin = Coin::native(Chain::Ethereum, "0xabc", "02aa");
        let payload = SigningPayload::new(
            coin,
            "0xdef",
            1,
            ChainSpecificFee::Evm {
                max_fee_per_gas: 1,
                priority_fee: 1,
                nonce: 0,
                gas_limit: 21_000,
            },
        );
        // the UTXO compiler must refuse an EVM payload
        let utxo = registry.for_chain(Chain::Bitcoin).unwrap();
        assert!(matches!(
            utxo.build_unsigned(&payload),
            Err(Error::InvalidPayload(_))
        ));
    }
}
