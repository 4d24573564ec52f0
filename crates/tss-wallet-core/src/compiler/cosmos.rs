//! Cosmos-SDK family transaction compiler (THORChain, Cosmos Hub).
//!
//! The SDK's protobuf surface needed here is small enough to encode by hand:
//! `MsgSend` wrapped in an `Any`, a `TxBody` with optional memo, an
//! `AuthInfo` with one SIGN_MODE_DIRECT signer, and the `SignDoc`/`TxRaw`
//! envelopes. The single preimage is SHA-256 of the SignDoc; the signature is
//! a raw 64-byte ECDSA `r || s` (no DER, no recovery id).

use crate::compiler::{check_family, expect_unsigned, TxCompiler, UnsignedTx};
use crate::signature::{verified_raw_ecdsa_signature, SignatureShares};
use crate::{Chain, ChainFamily, ChainSpecificFee, Error, Result, SigningPayload};
use sha2::{Digest, Sha256};

const MSG_SEND_TYPE_URL: &str = "/cosmos.bank.v1beta1.MsgSend";
const SECP256K1_PUBKEY_TYPE_URL: &str = "/cosmos.crypto.secp256k1.PubKey";
const SIGN_MODE_DIRECT: u64 = 1;

/// Per-chain network parameters
#[derive(Debug, Clone)]
struct NetworkParams {
    chain_id: &'static str,
    denom: &'static str,
    /// Fixed network fee in base units; zero means fee is gas-only
    fee_amount: u64,
}

fn network_params(chain: Chain) -> Result<NetworkParams> {
    match chain {
        Chain::ThorChain => Ok(NetworkParams {
            chain_id: "thorchain-1",
            denom: "rune",
            fee_amount: 2_000_000,
        }),
        Chain::GaiaChain => Ok(NetworkParams {
            chain_id: "cosmoshub-4",
            denom: "uatom",
            fee_amount: 7_500,
        }),
        other => Err(Error::UnsupportedChain(other.to_string())),
    }
}

/// Unsigned Cosmos transaction: the two SignDoc halves plus signer context
#[derive(Debug, Clone)]
pub struct UnsignedCosmosTx {
    pub body_bytes: Vec<u8>,
    pub auth_info_bytes: Vec<u8>,
    pub chain_id: String,
    pub account_number: u64,
}

impl UnsignedCosmosTx {
    /// Serialized SignDoc
    fn sign_doc(&self) -> Vec<u8> {
        let mut doc = Vec::new();
        write_bytes_field(&mut doc, 1, &self.body_bytes);
        write_bytes_field(&mut doc, 2, &self.auth_info_bytes);
        write_bytes_field(&mut doc, 3, self.chain_id.as_bytes());
        write_varint_field(&mut doc, 4, self.account_number);
        doc
    }
}

/// Compiler for Cosmos-SDK chains
pub struct CosmosCompiler;

impl CosmosCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CosmosCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TxCompiler for CosmosCompiler {
    fn family(&self) -> ChainFamily {
        ChainFamily::Cosmos
    }

    fn build_unsigned(&self, payload: &SigningPayload) -> Result<UnsignedTx> {
        check_family(payload, ChainFamily::Cosmos)?;
        let (account_number, sequence, gas) = match payload.fee {
            ChainSpecificFee::Cosmos {
                account_number,
                sequence,
                gas,
            } => (account_number, sequence, gas),
            _ => {
                return Err(Error::InvalidPayload(
                    "Cosmos payload requires account number and sequence".to_string(),
                ))
            }
        };
        let params = network_params(payload.coin.chain)?;
        let public_key = hex::decode(&payload.coin.hex_public_key)
            .map_err(|e| Error::InvalidPayload(format!("bad public key hex: {e}")))?;

        let msg = encode_msg_send(
            &payload.coin.address,
            &payload.to_address,
            params.denom,
            payload.amount,
        );
        let body_bytes = encode_tx_body(&msg, payload.memo.as_deref().unwrap_or(""));
        let auth_info_bytes =
            encode_auth_info(&public_key, sequence, params.denom, params.fee_amount, gas);

        Ok(UnsignedTx::Cosmos(UnsignedCosmosTx {
            body_bytes,
            auth_info_bytes,
            chain_id: params.chain_id.to_string(),
            account_number,
        }))
    }

    fn preimage_hashes(&self, unsigned: &UnsignedTx) -> Result<Vec<Vec<u8>>> {
        let tx = expect_unsigned!(unsigned, Cosmos)?;
        let hash: [u8; 32] = Sha256::digest(tx.sign_doc()).into();
        Ok(vec![hash.to_vec()])
    }

    fn compile_signed(
        &self,
        unsigned: &UnsignedTx,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        let tx = expect_unsigned!(unsigned, Cosmos)?;
        let preimage: [u8; 32] = Sha256::digest(tx.sign_doc()).into();
        let signature = verified_raw_ecdsa_signature(&preimage, shares, public_key)?;

        // TxRaw { body_bytes, auth_info_bytes, signatures }
        let mut tx_raw = Vec::new();
        write_bytes_field(&mut tx_raw, 1, &tx.body_bytes);
        write_bytes_field(&mut tx_raw, 2, &tx.auth_info_bytes);
        write_bytes_field(&mut tx_raw, 3, &signature);
        Ok(hex::encode(tx_raw))
    }
}

// ============ Message Encoding ============

fn encode_msg_send(from: &str, to: &str, denom: &str, amount: u128) -> Vec<u8> {
    let mut coin = Vec::new();
    write_bytes_field(&mut coin, 1, denom.as_bytes());
    write_bytes_field(&mut coin, 2, amount.to_string().as_bytes());

    let mut msg = Vec::new();
    write_bytes_field(&mut msg, 1, from.as_bytes());
    write_bytes_field(&mut msg, 2, to.as_bytes());
    write_bytes_field(&mut msg, 3, &coin);
    msg
}

/// `TxBody` with the message wrapped in an `Any`
fn encode_tx_body(msg_send: &[u8], memo: &str) -> Vec<u8> {
    let mut any = Vec::new();
    write_bytes_field(&mut any, 1, MSG_SEND_TYPE_URL.as_bytes());
    write_bytes_field(&mut any, 2, msg_send);

    let mut body = Vec::new();
    write_bytes_field(&mut body, 1, &any);
    if !memo.is_empty() {
        write_bytes_field(&mut body, 2, memo.as_bytes());
    }
    body
}

fn encode_auth_info(
    public_key: &[u8],
    sequence: u64,
    denom: &str,
    fee_amount: u64,
    gas: u64,
) -> Vec<u8> {
    // PubKey { key } wrapped in an Any
    let mut pk_proto = Vec::new();
    write_bytes_field(&mut pk_proto, 1, public_key);
    let mut any = Vec::new();
    write_bytes_field(&mut any, 1, SECP256K1_PUBKEY_TYPE_URL.as_bytes());
    write_bytes_field(&mut any, 2, &pk_proto);

    // ModeInfo { single { mode: DIRECT } }
    let mut single = Vec::new();
    write_varint_field(&mut single, 1, SIGN_MODE_DIRECT);
    let mut mode_info = Vec::new();
    write_bytes_field(&mut mode_info, 1, &single);

    let mut signer_info = Vec::new();
    write_bytes_field(&mut signer_info, 1, &any);
    write_bytes_field(&mut signer_info, 2, &mode_info);
    write_varint_field(&mut signer_info, 3, sequence);

    // Fee { amount, gas_limit }
    let mut fee = Vec::new();
    if fee_amount > 0 {
        let mut coin = Vec::new();
        write_bytes_field(&mut coin, 1, denom.as_bytes());
        write_bytes_field(&mut coin, 2, fee_amount.to_string().as_bytes());
        write_bytes_field(&mut fee, 1, &coin);
    }
    write_varint_field(&mut fee, 2, gas);

    let mut auth_info = Vec::new();
    write_bytes_field(&mut auth_info, 1, &signer_info);
    write_bytes_field(&mut auth_info, 2, &fee);
    auth_info
}

// ============ Protobuf Wire Helpers ============

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Length-delimited field (wire type 2)
fn write_bytes_field(out: &mut Vec<u8>, field: u32, data: &[u8]) {
    write_varint(out, u64::from(field) << 3 | 2);
    write_varint(out, data.len() as u64);
    out.extend_from_slice(data);
}

/// Varint field (wire type 0)
fn write_varint_field(out: &mut Vec<u8>, field: u32, value: u64) {
    write_varint(out, u64::from(field) << 3);
    write_varint(out, value);
}
