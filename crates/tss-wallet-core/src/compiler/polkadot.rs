//! Polkadot transaction compiler.
//!
//! Encodes a balances transfer-keep-alive extrinsic in SCALE: the call, a
//! mortal era derived from the current block, compact nonce and tip, the
//! spec/transaction version words and the genesis/block hashes. Payloads over
//! 256 bytes are blake2b-hashed before signing, per the extrinsic format;
//! a plain transfer stays under that limit so the preimage is the payload
//! itself. Signatures are raw 64-byte ed25519.

use crate::compiler::{check_family, expect_unsigned, TxCompiler, UnsignedTx};
use crate::signature::{verified_eddsa_signature, SignatureShares};
use crate::{ChainFamily, ChainSpecificFee, Error, Result, SigningPayload};
use blake2::{Blake2b512, Digest};

/// Balances pallet index on Polkadot
const BALANCES_PALLET: u8 = 4;
/// `transfer_keep_alive` call index
const TRANSFER_KEEP_ALIVE: u8 = 3;
/// Mortality window in blocks
const ERA_PERIOD: u64 = 64;

/// Extrinsic mortality
#[derive(Debug, Clone, Copy)]
pub enum Era {
    Immortal,
    Mortal { period: u64, phase: u64 },
}

impl Era {
    /// Mortal era anchored at `current_block`
    pub fn mortal(current_block: u64, period: u64) -> Self {
        let period = period.next_power_of_two().clamp(4, 65536);
        let phase = current_block % period;
        Self::Mortal { period, phase }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Immortal => vec![0x00],
            Self::Mortal { period, phase } => {
                let quantize_factor = (*period >> 12).max(1);
                let quantized_phase = phase / quantize_factor;
                let period_log2 = period.trailing_zeros() as u16;
                let encoded = (quantized_phase as u16) << 4 | (period_log2 - 1).min(15);
                encoded.to_le_bytes().to_vec()
            }
        }
    }
}

/// Unsigned Polkadot extrinsic
#[derive(Debug, Clone)]
pub struct UnsignedPolkadotTx {
    pub sender: [u8; 32],
    pub dest: [u8; 32],
    pub value: u128,
    pub nonce: u64,
    pub tip: u128,
    pub era: Era,
    pub spec_version: u32,
    pub transaction_version: u32,
    pub genesis_hash: [u8; 32],
    pub block_hash: [u8; 32],
}

impl UnsignedPolkadotTx {
    fn encode_call(&self) -> Vec<u8> {
        let mut call = Vec::with_capacity(40);
        call.push(BALANCES_PALLET);
        call.push(TRANSFER_KEEP_ALIVE);
        call.push(0x00); // MultiAddress::Id
        call.extend_from_slice(&self.dest);
        call.extend_from_slice(&compact_encode(self.value));
        call
    }

    /// Payload the engine signs; hashed when it exceeds 256 bytes
    fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&self.encode_call());
        payload.extend_from_slice(&self.era.encode());
        payload.extend_from_slice(&compact_encode(u128::from(self.nonce)));
        payload.extend_from_slice(&compact_encode(self.tip));
        payload.extend_from_slice(&self.spec_version.to_le_bytes());
        payload.extend_from_slice(&self.transaction_version.to_le_bytes());
        payload.extend_from_slice(&self.genesis_hash);
        payload.extend_from_slice(&self.block_hash);

        if payload.len() > 256 {
            let mut hasher = Blake2b512::new();
            hasher.update(&payload);
            hasher.finalize()[..32].to_vec()
        } else {
            payload
        }
    }
}

/// Compiler for Polkadot
pub struct PolkadotCompiler;

impl PolkadotCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PolkadotCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TxCompiler for PolkadotCompiler {
    fn family(&self) -> ChainFamily {
        ChainFamily::Polkadot
    }

    fn build_unsigned(&self, payload: &SigningPayload) -> Result<UnsignedTx> {
        check_family(payload, ChainFamily::Polkadot)?;
        let (recent_block_hash, nonce, current_block_number, spec_version, transaction_version, genesis_hash) =
            match &payload.fee {
                ChainSpecificFee::Polkadot {
                    recent_block_hash,
                    nonce,
                    current_block_number,
                    spec_version,
                    transaction_version,
                    genesis_hash,
                } => (
                    recent_block_hash,
                    *nonce,
                    *current_block_number,
                    *spec_version,
                    *transaction_version,
                    genesis_hash,
                ),
                _ => {
                    return Err(Error::InvalidPayload(
                        "Polkadot payload requires era and version fields".to_string(),
                    ))
                }
            };

        Ok(UnsignedTx::Polkadot(UnsignedPolkadotTx {
            sender: decode_ss58(&payload.coin.address)?,
            dest: decode_ss58(&payload.to_address)?,
            value: payload.amount,
            nonce,
            tip: 0,
            era: Era::mortal(current_block_number, ERA_PERIOD),
            spec_version,
            transaction_version,
            genesis_hash: decode_hash32(genesis_hash)?,
            block_hash: decode_hash32(recent_block_hash)?,
        }))
    }

    fn preimage_hashes(&self, unsigned: &UnsignedTx) -> Result<Vec<Vec<u8>>> {
        let tx = expect_unsigned!(unsigned, Polkadot)?;
        Ok(vec![tx.signing_payload()])
    }

    fn compile_signed(
        &self,
        unsigned: &UnsignedTx,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        let tx = expect_unsigned!(unsigned, Polkadot)?;
        let key: [u8; 32] = public_key
            .try_into()
            .map_err(|_| Error::InvalidPublicKey("Polkadot key must be 32 bytes".to_string()))?;
        if key != tx.sender {
            return Err(Error::SignatureVerificationFailed(
                "public key does not match the sender account".to_string(),
            ));
        }

        let preimage = tx.signing_payload();
        let signature = verified_eddsa_signature(&preimage, shares, &key)?;

        let mut data = Vec::new();
        data.push(0x84); // signed extrinsic, version 4
        data.push(0x00); // MultiAddress::Id
        data.extend_from_slice(&tx.sender);
        data.push(0x00); // ed25519 signature type
        data.extend_from_slice(&signature);
        data.extend_from_slice(&tx.era.encode());
        data.extend_from_slice(&compact_encode(u128::from(tx.nonce)));
        data.extend_from_slice(&compact_encode(tx.tip));
        data.extend_from_slice(&tx.encode_call());

        let mut out = compact_encode(data.len() as u128);
        out.extend_from_slice(&data);
        Ok(hex::encode(out))
    }
}

/// SCALE compact encoding
pub(crate) fn compact_encode(value: u128) -> Vec<u8> {
    if value < 0x40 {
        vec![(value << 2) as u8]
    } else if value < 0x4000 {
        (((value << 2) | 0x01) as u16).to_le_bytes().to_vec()
    } else if value < 0x4000_0000 {
        (((value << 2) | 0x02) as u32).to_le_bytes().to_vec()
    } else {
        let bytes_needed = (128 - value.leading_zeros()).div_ceil(8);
        let mut out = vec![((bytes_needed - 4) << 2 | 0x03) as u8];
        for i in 0..bytes_needed {
            out.push((value >> (8 * i)) as u8);
        }
        out
    }
}

fn decode_ss58(address: &str) -> Result<[u8; 32]> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| Error::InvalidPayload(format!("bad SS58 address: {e}")))?;
    if decoded.len() != 35 {
        return Err(Error::InvalidPayload(
            "SS58 address must decode to 35 bytes".to_string(),
        ));
    }
    let mut hasher = Blake2b512::new();
    hasher.update(b"SS58PRE");
    hasher.update(&decoded[..33]);
    let checksum = hasher.finalize();
    if decoded[33..] != checksum[..2] {
        return Err(Error::InvalidPayload("SS58 checksum mismatch".to_string()));
    }
    decoded[1..33]
        .try_into()
        .map_err(|_| Error::Internal("slice length".to_string()))
}

fn decode_hash32(hash_hex: &str) -> Result<[u8; 32]> {
    let stripped = hash_hex.strip_prefix("0x").unwrap_or(hash_hex);
    let bytes = hex::decode(stripped)
        .map_err(|e| Error::InvalidPayload(format!("bad block hash: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidPayload("block hash must be 32 bytes".to_string()))
}
