//! TON transaction compiler.
//!
//! Builds the wallet-v4r2 external message body: wallet id, expiry, seqno,
//! op, send mode, then the internal transfer (destination hash, amount,
//! optional comment). The preimage is SHA-256 of the body, keeping the share
//! map keyed by a fixed 32-byte digest like the other account chains. The
//! signed output is `signature || public key || body`, hex encoded, ready for
//! the wallet contract's external-message wrapper.

use crate::compiler::{check_family, expect_unsigned, TxCompiler, UnsignedTx};
use crate::keys::{crc16_ccitt, ton_state_init_hash, TON_WALLET_ID};
use crate::signature::{verified_eddsa_signature, SignatureShares};
use crate::{ChainFamily, ChainSpecificFee, Error, Result, SigningPayload};
use sha2::{Digest, Sha256};

/// Pay fees separately and ignore transfer errors
const SEND_MODE: u8 = 3;

/// Unsigned TON transaction
#[derive(Debug, Clone)]
pub struct UnsignedTonTx {
    pub body: Vec<u8>,
    /// Account hash of the sender wallet
    pub sender_hash: [u8; 32],
}

/// Compiler for TON
pub struct TonCompiler;

impl TonCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TonCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TxCompiler for TonCompiler {
    fn family(&self) -> ChainFamily {
        ChainFamily::Ton
    }

    fn build_unsigned(&self, payload: &SigningPayload) -> Result<UnsignedTx> {
        check_family(payload, ChainFamily::Ton)?;
        let (seqno, expire_at) = match payload.fee {
            ChainSpecificFee::Ton {
                sequence_number,
                expire_at,
            } => (sequence_number, expire_at),
            _ => {
                return Err(Error::InvalidPayload(
                    "TON payload requires a sequence number".to_string(),
                ))
            }
        };

        let sender_hash = decode_ton_address(&payload.coin.address)?;
        let dest_hash = decode_ton_address(&payload.to_address)?;
        let amount: u64 = payload
            .amount
            .try_into()
            .map_err(|_| Error::InvalidPayload("amount exceeds u64 range".to_string()))?;
        let expire_at: u32 = expire_at
            .try_into()
            .map_err(|_| Error::InvalidPayload("expiry timestamp exceeds u32 range".to_string()))?;

        let mut body = Vec::new();
        body.extend_from_slice(&TON_WALLET_ID.to_be_bytes());
        body.extend_from_slice(&expire_at.to_be_bytes());
        body.extend_from_slice(&seqno.to_be_bytes());
        body.push(0); // op: simple transfer
        body.push(SEND_MODE);
        body.extend_from_slice(&dest_hash);
        body.extend_from_slice(&amount.to_be_bytes());
        if let Some(comment) = &payload.memo {
            body.extend_from_slice(comment.as_bytes());
        }

        Ok(UnsignedTx::Ton(UnsignedTonTx { body, sender_hash }))
    }

    fn preimage_hashes(&self, unsigned: &UnsignedTx) -> Result<Vec<Vec<u8>>> {
        let tx = expect_unsigned!(unsigned, Ton)?;
        let hash: [u8; 32] = Sha256::digest(&tx.body).into();
        Ok(vec![hash.to_vec()])
    }

    fn compile_signed(
        &self,
        unsigned: &UnsignedTx,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        let tx = expect_unsigned!(unsigned, Ton)?;
        let key: [u8; 32] = public_key
            .try_into()
            .map_err(|_| Error::InvalidPublicKey("TON key must be 32 bytes".to_string()))?;
        if ton_state_init_hash(&key) != tx.sender_hash {
            return Err(Error::SignatureVerificationFailed(
                "public key does not match the sender wallet".to_string(),
            ));
        }

        let preimage: [u8; 32] = Sha256::digest(&tx.body).into();
        let signature = verified_eddsa_signature(&preimage, shares, &key)?;

        let mut out = Vec::with_capacity(64 + 32 + tx.body.len());
        out.extend_from_slice(&signature);
        out.extend_from_slice(&key);
        out.extend_from_slice(&tx.body);
        Ok(hex::encode(out))
    }
}

/// Parse a user-friendly (base64url, 36 bytes with crc16) or raw
/// (`workchain:hex`) TON address down to the 32-byte account hash.
fn decode_ton_address(address: &str) -> Result<[u8; 32]> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    if let Some((_, hash_hex)) = address.split_once(':') {
        let bytes = hex::decode(hash_hex)
            .map_err(|e| Error::InvalidPayload(format!("bad raw TON address: {e}")))?;
        return bytes
            .try_into()
            .map_err(|_| Error::InvalidPayload("TON account hash must be 32 bytes".to_string()));
    }

    let raw = URL_SAFE_NO_PAD
        .decode(address)
        .map_err(|e| Error::InvalidPayload(format!("bad TON address: {e}")))?;
    if raw.len() != 36 {
        return Err(Error::InvalidPayload(
            "TON address must decode to 36 bytes".to_string(),
        ));
    }
    let crc = crc16_ccitt(&raw[..34]);
    if raw[34..] != crc.to_be_bytes() {
        return Err(Error::InvalidPayload("TON address checksum mismatch".to_string()));
    }
    raw[2..34]
        .try_into()
        .map_err(|_| Error::Internal("slice length".to_string()))
}
