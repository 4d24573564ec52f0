//! UTXO-family transaction compiler (Bitcoin, Bitcoin Cash, Litecoin,
//! Dogecoin, Dash).
//!
//! Coin selection is the caller's job: every [`crate::UnspentOutput`] in the
//! payload is spent. The compiler locks inputs with the script form implied
//! by the sender address (P2WPKH for bech32 chains, P2PKH for the legacy
//! ones), appends an OP_RETURN output when a memo is present, and returns
//! change above the dust threshold to the sender.
//!
//! Sighash rules per chain: Bitcoin and Litecoin use the BIP-143 segwit
//! digest; Bitcoin Cash uses the same digest with the FORKID sighash type
//! (0x41); Dogecoin and Dash use the original per-input legacy digest. Every
//! input produces its own preimage, so N inputs require N signature shares.

use crate::compiler::{check_family, expect_unsigned, TxCompiler, UnsignedTx};
use crate::keys::{hash160, sha256d};
use crate::signature::{verified_der_signature, SignatureShares};
use crate::{Chain, ChainFamily, ChainSpecificFee, Error, Result, SigningPayload};

const SEQUENCE_FINAL: u32 = 0xffff_ffff;
const DUST_LIMIT: u64 = 546;
const SIGHASH_ALL: u32 = 0x01;
/// SIGHASH_ALL | SIGHASH_FORKID, required by Bitcoin Cash
const SIGHASH_ALL_FORKID: u32 = 0x41;

/// One spent output with everything needed to sign it
#[derive(Debug, Clone)]
pub struct UtxoInput {
    /// txid in big-endian display order
    pub txid: [u8; 32],
    pub vout: u32,
    /// Value of the spent output, in satoshi
    pub value: u64,
    pub sequence: u32,
}

#[derive(Debug, Clone)]
pub struct UtxoOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

/// Unsigned UTXO transaction plus the signing context shared by all inputs
#[derive(Debug, Clone)]
pub struct UnsignedUtxoTx {
    pub chain: Chain,
    pub version: u32,
    pub inputs: Vec<UtxoInput>,
    pub outputs: Vec<UtxoOutput>,
    pub lock_time: u32,
    /// Witness (BIP-143) signing and serialization rules
    pub segwit: bool,
    /// 20-byte pubkey hash of the sender; all inputs spend to the same key
    pub sender_pubkey_hash: [u8; 20],
    /// scriptPubKey of the spent outputs (sender's own locking script)
    pub sender_script_pubkey: Vec<u8>,
    /// Sighash type attached to every signature
    pub sighash_type: u32,
}

/// Compiler for all Bitcoin-family chains
pub struct UtxoCompiler;

impl UtxoCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for UtxoCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TxCompiler for UtxoCompiler {
    fn family(&self) -> ChainFamily {
        ChainFamily::Utxo
    }

    fn build_unsigned(&self, payload: &SigningPayload) -> Result<UnsignedTx> {
        check_family(payload, ChainFamily::Utxo)?;
        let (byte_fee, send_max) = match payload.fee {
            ChainSpecificFee::Utxo { byte_fee, send_max } => (byte_fee, send_max),
            _ => {
                return Err(Error::InvalidPayload(
                    "UTXO payload requires a byte-fee".to_string(),
                ))
            }
        };
        if payload.utxos.is_empty() {
            return Err(Error::InvalidPayload("no inputs to spend".to_string()));
        }

        let chain = payload.coin.chain;
        let segwit = is_segwit_chain(chain);
        let sender_pubkey_hash = pubkey_hash_for_address(&payload.coin.address, chain)?;
        let sender_script_pubkey = if segwit {
            p2wpkh_script(&sender_pubkey_hash)
        } else {
            p2pkh_script(&sender_pubkey_hash)
        };

        let inputs: Vec<UtxoInput> = payload
            .utxos
            .iter()
            .map(|u| UtxoInput {
                txid: u.hash,
                vout: u.index,
                value: u.amount,
                sequence: SEQUENCE_FINAL,
            })
            .collect();
        let total_in: u64 = inputs.iter().map(|i| i.value).sum();

        let dest_script = script_for_destination(&payload.to_address, chain)?;
        let mut outputs = Vec::with_capacity(3);

        // fee estimate assumes the worst case of a change output being added
        let n_out_estimate = 2 + usize::from(payload.memo.is_some());
        let fee = byte_fee
            .checked_mul(estimate_vsize(segwit, inputs.len(), n_out_estimate))
            .ok_or_else(|| Error::InvalidPayload("fee overflow".to_string()))?;

        let amount: u64 = if send_max {
            total_in
                .checked_sub(fee)
                .ok_or_else(|| Error::InvalidPayload("fee exceeds input value".to_string()))?
        } else {
            payload
                .amount
                .try_into()
                .map_err(|_| Error::InvalidPayload("amount exceeds u64 range".to_string()))?
        };
        outputs.push(UtxoOutput {
            value: amount,
            script_pubkey: dest_script,
        });

        if let Some(memo) = &payload.memo {
            outputs.push(UtxoOutput {
                value: 0,
                script_pubkey: op_return_script(memo.as_bytes())?,
            });
        }

        if !send_max {
            let spent = amount
                .checked_add(fee)
                .ok_or_else(|| Error::InvalidPayload("amount overflow".to_string()))?;
            let change = total_in.checked_sub(spent).ok_or_else(|| {
                Error::InvalidPayload(format!(
                    "insufficient funds: inputs {total_in}, needed {spent}"
                ))
            })?;
            if change > DUST_LIMIT {
                outputs.push(UtxoOutput {
                    value: change,
                    script_pubkey: sender_script_pubkey.clone(),
                });
            }
        }

        Ok(UnsignedTx::Utxo(UnsignedUtxoTx {
            chain,
            version: 2,
            inputs,
            outputs,
            lock_time: 0,
            segwit,
            sender_pubkey_hash,
            sender_script_pubkey,
            sighash_type: if chain == Chain::BitcoinCash {
                SIGHASH_ALL_FORKID
            } else {
                SIGHASH_ALL
            },
        }))
    }

    fn preimage_hashes(&self, unsigned: &UnsignedTx) -> Result<Vec<Vec<u8>>> {
        let tx = expect_unsigned!(unsigned, Utxo)?;
        let use_bip143 = tx.segwit || tx.chain == Chain::BitcoinCash;
        (0..tx.inputs.len())
            .map(|i| {
                if use_bip143 {
                    Ok(bip143_sighash(tx, i).to_vec())
                } else {
                    Ok(legacy_sighash(tx, i).to_vec())
                }
            })
            .collect()
    }

    fn compile_signed(
        &self,
        unsigned: &UnsignedTx,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        let tx = expect_unsigned!(unsigned, Utxo)?;

        // the derived key must actually own the spent outputs
        if hash160(public_key) != tx.sender_pubkey_hash {
            return Err(Error::SignatureVerificationFailed(
                "public key does not match the sender script".to_string(),
            ));
        }

        let preimages = self.preimage_hashes(unsigned)?;
        let mut signatures = Vec::with_capacity(preimages.len());
        for preimage in &preimages {
            let mut der = verified_der_signature(preimage, shares, public_key)?;
            der.push(tx.sighash_type as u8);
            signatures.push(der);
        }

        Ok(hex::encode(serialize_signed(tx, &signatures, public_key)))
    }
}

// ============ Scripts & Addresses ============

fn is_segwit_chain(chain: Chain) -> bool {
    matches!(chain, Chain::Bitcoin | Chain::Litecoin)
}

/// `OP_0 OP_PUSH20 <hash>`
fn p2wpkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.push(0x00);
    script.push(0x14);
    script.extend_from_slice(pubkey_hash);
    script
}

/// `OP_DUP OP_HASH160 OP_PUSH20 <hash> OP_EQUALVERIFY OP_CHECKSIG`
fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[0x76, 0xa9, 0x14]);
    script.extend_from_slice(pubkey_hash);
    script.extend_from_slice(&[0x88, 0xac]);
    script
}

/// `OP_RETURN <memo>` (single push, 75-byte direct-push limit)
fn op_return_script(memo: &[u8]) -> Result<Vec<u8>> {
    if memo.len() > 75 {
        return Err(Error::InvalidPayload(format!(
            "memo too long for OP_RETURN: {} bytes",
            memo.len()
        )));
    }
    let mut script = Vec::with_capacity(memo.len() + 2);
    script.push(0x6a);
    script.push(memo.len() as u8);
    script.extend_from_slice(memo);
    Ok(script)
}

/// Extract the 20-byte pubkey hash from the sender's own address
fn pubkey_hash_for_address(address: &str, chain: Chain) -> Result<[u8; 20]> {
    if is_segwit_chain(chain) {
        let (_, data, _) = bech32::decode(address)
            .map_err(|e| Error::InvalidPayload(format!("bad sender address: {e}")))?;
        use bech32::FromBase32;
        if data.is_empty() {
            return Err(Error::InvalidPayload("empty witness program".to_string()));
        }
        let program = Vec::<u8>::from_base32(&data[1..])
            .map_err(|e| Error::InvalidPayload(format!("bad witness program: {e}")))?;
        program
            .try_into()
            .map_err(|_| Error::InvalidPayload("witness program must be 20 bytes".to_string()))
    } else {
        let decoded = bs58::decode(address)
            .into_vec()
            .map_err(|e| Error::InvalidPayload(format!("bad sender address: {e}")))?;
        if decoded.len() != 25 {
            return Err(Error::InvalidPayload(
                "base58 address must decode to 25 bytes".to_string(),
            ));
        }
        let checksum = sha256d(&decoded[..21]);
        if checksum[..4] != decoded[21..] {
            return Err(Error::InvalidPayload("address checksum mismatch".to_string()));
        }
        decoded[1..21]
            .try_into()
            .map_err(|_| Error::Internal("slice length".to_string()))
    }
}

/// Locking script for an arbitrary destination address on `chain`
fn script_for_destination(address: &str, chain: Chain) -> Result<Vec<u8>> {
    if is_segwit_chain(chain) && address.to_ascii_lowercase().starts_with(segwit_hrp(chain)) {
        let hash = pubkey_hash_for_address(address, chain)?;
        Ok(p2wpkh_script(&hash))
    } else {
        let hash = pubkey_hash_for_address_base58(address)?;
        Ok(p2pkh_script(&hash))
    }
}

fn segwit_hrp(chain: Chain) -> &'static str {
    match chain {
        Chain::Litecoin => "ltc1",
        _ => "bc1",
    }
}

fn pubkey_hash_for_address_base58(address: &str) -> Result<[u8; 20]> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| Error::InvalidPayload(format!("bad destination address: {e}")))?;
    if decoded.len() != 25 {
        return Err(Error::InvalidPayload(
            "base58 address must decode to 25 bytes".to_string(),
        ));
    }
    let checksum = sha256d(&decoded[..21]);
    if checksum[..4] != decoded[21..] {
        return Err(Error::InvalidPayload("address checksum mismatch".to_string()));
    }
    decoded[1..21]
        .try_into()
        .map_err(|_| Error::Internal("slice length".to_string()))
}

// ============ Sighash ============

/// BIP-143 digest for input `index` (also used by Bitcoin Cash with the
/// FORKID sighash type)
fn bip143_sighash(tx: &UnsignedUtxoTx, index: usize) -> [u8; 32] {
    let input = &tx.inputs[index];

    let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
    let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
    for i in &tx.inputs {
        prevouts.extend_from_slice(&reversed(&i.txid));
        prevouts.extend_from_slice(&i.vout.to_le_bytes());
        sequences.extend_from_slice(&i.sequence.to_le_bytes());
    }
    let hash_prevouts = sha256d(&prevouts);
    let hash_sequence = sha256d(&sequences);

    let mut outputs = Vec::new();
    for o in &tx.outputs {
        outputs.extend_from_slice(&o.value.to_le_bytes());
        write_var_int(&mut outputs, o.script_pubkey.len() as u64);
        outputs.extend_from_slice(&o.script_pubkey);
    }
    let hash_outputs = sha256d(&outputs);

    // scriptCode is the canonical P2PKH form of the sender key
    let script_code = p2pkh_script(&tx.sender_pubkey_hash);

    let mut preimage = Vec::with_capacity(156 + script_code.len());
    preimage.extend_from_slice(&tx.version.to_le_bytes());
    preimage.extend_from_slice(&hash_prevouts);
    preimage.extend_from_slice(&hash_sequence);
    preimage.extend_from_slice(&reversed(&input.txid));
    preimage.extend_from_slice(&input.vout.to_le_bytes());
    write_var_int(&mut preimage, script_code.len() as u64);
    preimage.extend_from_slice(&script_code);
    preimage.extend_from_slice(&input.value.to_le_bytes());
    preimage.extend_from_slice(&input.sequence.to_le_bytes());
    preimage.extend_from_slice(&hash_outputs);
    preimage.extend_from_slice(&tx.lock_time.to_le_bytes());
    preimage.extend_from_slice(&tx.sighash_type.to_le_bytes());

    sha256d(&preimage)
}

/// Original pre-segwit digest: serialize the whole transaction with the
/// spent output's script in the signed input and empty scripts elsewhere
fn legacy_sighash(tx: &UnsignedUtxoTx, index: usize) -> [u8; 32] {
    let mut ser = Vec::new();
    ser.extend_from_slice(&tx.version.to_le_bytes());

    write_var_int(&mut ser, tx.inputs.len() as u64);
    for (i, input) in tx.inputs.iter().enumerate() {
        ser.extend_from_slice(&reversed(&input.txid));
        ser.extend_from_slice(&input.vout.to_le_bytes());
        if i == index {
            write_var_int(&mut ser, tx.sender_script_pubkey.len() as u64);
            ser.extend_from_slice(&tx.sender_script_pubkey);
        } else {
            write_var_int(&mut ser, 0);
        }
        ser.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_var_int(&mut ser, tx.outputs.len() as u64);
    for o in &tx.outputs {
        ser.extend_from_slice(&o.value.to_le_bytes());
        write_var_int(&mut ser, o.script_pubkey.len() as u64);
        ser.extend_from_slice(&o.script_pubkey);
    }

    ser.extend_from_slice(&tx.lock_time.to_le_bytes());
    ser.extend_from_slice(&tx.sighash_type.to_le_bytes());
    sha256d(&ser)
}

// ============ Final Serialization ============

fn serialize_signed(tx: &UnsignedUtxoTx, signatures: &[Vec<u8>], public_key: &[u8]) -> Vec<u8> {
    let mut ser = Vec::new();
    ser.extend_from_slice(&tx.version.to_le_bytes());

    if tx.segwit {
        ser.push(0x00); // marker
        ser.push(0x01); // flag
    }

    write_var_int(&mut ser, tx.inputs.len() as u64);
    for (i, input) in tx.inputs.iter().enumerate() {
        ser.extend_from_slice(&reversed(&input.txid));
        ser.extend_from_slice(&input.vout.to_le_bytes());
        if tx.segwit {
            write_var_int(&mut ser, 0); // scriptSig empty, witness carries the proof
        } else {
            let script_sig = build_script_sig(&signatures[i], public_key);
            write_var_int(&mut ser, script_sig.len() as u64);
            ser.extend_from_slice(&script_sig);
        }
        ser.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_var_int(&mut ser, tx.outputs.len() as u64);
    for o in &tx.outputs {
        ser.extend_from_slice(&o.value.to_le_bytes());
        write_var_int(&mut ser, o.script_pubkey.len() as u64);
        ser.extend_from_slice(&o.script_pubkey);
    }

    if tx.segwit {
        for sig in signatures {
            write_var_int(&mut ser, 2);
            write_var_int(&mut ser, sig.len() as u64);
            ser.extend_from_slice(sig);
            write_var_int(&mut ser, public_key.len() as u64);
            ser.extend_from_slice(public_key);
        }
    }

    ser.extend_from_slice(&tx.lock_time.to_le_bytes());
    ser
}

/// `<sig+type> <pubkey>` push-only script
fn build_script_sig(signature: &[u8], public_key: &[u8]) -> Vec<u8> {
    let mut script = Vec::with_capacity(signature.len() + public_key.len() + 2);
    script.push(signature.len() as u8);
    script.extend_from_slice(signature);
    script.push(public_key.len() as u8);
    script.extend_from_slice(public_key);
    script
}

fn estimate_vsize(segwit: bool, n_inputs: usize, n_outputs: usize) -> u64 {
    if segwit {
        // 10.75 vbyte overhead, 68 per input, 31 per P2WPKH output
        11 + 68 * n_inputs as u64 + 31 * n_outputs as u64
    } else {
        10 + 148 * n_inputs as u64 + 34 * n_outputs as u64
    }
}

fn reversed(bytes: &[u8; 32]) -> [u8; 32] {
    let mut out = *bytes;
    out.reverse();
    out
}

/// Bitcoin variable-length integer
pub(crate) fn write_var_int(out: &mut Vec<u8>, value: u64) {
    match value {
        0..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::address_from_public_key;
    use crate::{Coin, SignatureShare, UnspentOutput};
    use k256::ecdsa::signature::hazmat::PrehashSigner;
    use k256::ecdsa::{Signature as EcdsaSignature, SigningKey};

    fn test_key() -> SigningKey {
        SigningKey::from_slice(&[11u8; 32]).unwrap()
    }

    fn payload_for(chain: Chain, n_inputs: usize, memo: Option<&str>) -> (SigningPayload, Vec<u8>) {
        let key = test_key();
        let public_key = key.verifying_key().to_sec1_bytes().to_vec();
        let address = address_from_public_key(&hex::encode(&public_key), chain).unwrap();
        let utxos = (0..n_inputs)
            .map(|i| UnspentOutput::new([i as u8 + 1; 32], 100_000, i as u32))
            .collect();
        let mut payload = SigningPayload::new(
            Coin::native(chain, address.clone(), hex::encode(&public_key)),
            address, // send to self keeps the test self-contained
            50_000,
            ChainSpecificFee::Utxo {
                byte_fee: 10,
                send_max: false,
            },
        )
        .with_utxos(utxos);
        if let Some(m) = memo {
            payload = payload.with_memo(m);
        }
        (payload, public_key)
    }

    fn shares_for(preimages: &[Vec<u8>], key: &SigningKey) -> SignatureShares {
        let mut shares = SignatureShares::new();
        for preimage in preimages {
            let sig: EcdsaSignature = key.sign_prehash(preimage).unwrap();
            let bytes = sig.to_bytes();
            shares.insert(
                hex::encode(preimage),
                SignatureShare {
                    msg: hex::encode(preimage),
                    r: hex::encode(&bytes[..32]),
                    s: hex::encode(&bytes[32..]),
                    der_signature: hex::encode(sig.to_der().as_bytes()),
                    recovery_id: "00".to_string(),
                },
            );
        }
        shares
    }

    #[test]
    fn test_preimage_count_matches_input_count() {
        let compiler = UtxoCompiler::new();
        for n in [1usize, 3, 7] {
            let (payload, _) = payload_for(Chain::Bitcoin, n, None);
            let unsigned = compiler.build_unsigned(&payload).unwrap();
            let preimages = compiler.preimage_hashes(&unsigned).unwrap();
            assert_eq!(preimages.len(), n);
            // 32-byte double-sha digests, all distinct
            for p in &preimages {
                assert_eq!(p.len(), 32);
            }
        }
    }

    #[test]
    fn test_missing_share_fails_with_unavailable() {
        let compiler = UtxoCompiler::new();
        let (payload, public_key) = payload_for(Chain::Bitcoin, 3, None);
        let unsigned = compiler.build_unsigned(&payload).unwrap();
        let preimages = compiler.preimage_hashes(&unsigned).unwrap();

        // supply shares for all but the last input
        let shares = shares_for(&preimages[..2], &test_key());
        let err = compiler
            .compile_signed(&unsigned, &shares, &public_key)
            .unwrap_err();
        assert!(matches!(err, Error::SignatureUnavailable(_)));
    }

    #[test]
    fn test_segwit_compile_roundtrip() {
        let compiler = UtxoCompiler::new();
        let (payload, public_key) = payload_for(Chain::Bitcoin, 2, Some("hello"));
        let unsigned = compiler.build_unsigned(&payload).unwrap();
        let preimages = compiler.preimage_hashes(&unsigned).unwrap();
        let shares = shares_for(&preimages, &test_key());

        let tx_hex = compiler
            .compile_signed(&unsigned, &shares, &public_key)
            .unwrap();
        let raw = hex::decode(&tx_hex).unwrap();
        // version 2, segwit marker + flag
        assert_eq!(&raw[..6], &[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
        // OP_RETURN output with the memo is present
        assert!(tx_hex.contains(&hex::encode(b"hello")));
    }

    #[test]
    fn test_legacy_compile_has_script_sig() {
        let compiler = UtxoCompiler::new();
        let (payload, public_key) = payload_for(Chain::Dogecoin, 1, None);
        let unsigned = compiler.build_unsigned(&payload).unwrap();
        let preimages = compiler.preimage_hashes(&unsigned).unwrap();
        let shares = shares_for(&preimages, &test_key());

        let tx_hex = compiler
            .compile_signed(&unsigned, &shares, &public_key)
            .unwrap();
        let raw = hex::decode(&tx_hex).unwrap();
        // no segwit marker on legacy chains
        assert_ne!(&raw[4..6], &[0x00, 0x01]);
        // the pubkey appears in the scriptSig
        assert!(tx_hex.contains(&hex::encode(&public_key)));
    }

    #[test]
    fn test_bch_uses_forkid_sighash_type() {
        let compiler = UtxoCompiler::new();
        let (payload, _) = payload_for(Chain::BitcoinCash, 1, None);
        let unsigned = compiler.build_unsigned(&payload).unwrap();
        match &unsigned {
            UnsignedTx::Utxo(tx) => assert_eq!(tx.sighash_type, SIGHASH_ALL_FORKID),
            _ => panic!("wrong envelope"),
        }
    }

    #[test]
    fn test_change_output_returns_to_sender() {
        let compiler = UtxoCompiler::new();
        let (payload, _) = payload_for(Chain::Bitcoin, 1, None);
        let unsigned = compiler.build_unsigned(&payload).unwrap();
        match &unsigned {
            UnsignedTx::Utxo(tx) => {
                assert_eq!(tx.outputs.len(), 2);
                assert_eq!(tx.outputs[1].script_pubkey, tx.sender_script_pubkey);
                let total: u64 = tx.outputs.iter().map(|o| o.value).sum();
                assert!(total < 100_000); // fee was deducted
            }
            _ => panic!("wrong envelope"),
        }
    }

    #[test]
    fn test_send_max_spends_everything() {
        let compiler = UtxoCompiler::new();
        let (mut payload, _) = payload_for(Chain::Bitcoin, 2, None);
        payload.fee = ChainSpecificFee::Utxo {
            byte_fee: 10,
            send_max: true,
        };
        let unsigned = compiler.build_unsigned(&payload).unwrap();
        match &unsigned {
            UnsignedTx::Utxo(tx) => {
                assert_eq!(tx.outputs.len(), 1);
                assert!(tx.outputs[0].value < 200_000);
            }
            _ => panic!("wrong envelope"),
        }
    }

    #[test]
    fn test_absurd_byte_fee_rejected() {
        let compiler = UtxoCompiler::new();
        let (mut payload, _) = payload_for(Chain::Bitcoin, 1, None);
        payload.fee = ChainSpecificFee::Utxo {
            byte_fee: u64::MAX,
            send_max: false,
        };
        assert!(matches!(
            compiler.build_unsigned(&payload),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_insufficient_funds_rejected() {
        let compiler = UtxoCompiler::new();
        let (mut payload, _) = payload_for(Chain::Bitcoin, 1, None);
        payload.amount = 10_000_000; // more than the single 100k input
        assert!(matches!(
            compiler.build_unsigned(&payload),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_wrong_pubkey_rejected_before_signatures() {
        let compiler = UtxoCompiler::new();
        let (payload, _) = payload_for(Chain::Bitcoin, 1, None);
        let unsigned = compiler.build_unsigned(&payload).unwrap();
        let other = SigningKey::from_slice(&[12u8; 32]).unwrap();
        let err = compiler
            .compile_signed(
                &unsigned,
                &SignatureShares::new(),
                &other.verifying_key().to_sec1_bytes(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::SignatureVerificationFailed(_)));
    }

    #[test]
    fn test_var_int_encoding() {
        let mut out = Vec::new();
        write_var_int(&mut out, 0xfc);
        write_var_int(&mut out, 0xfd);
        write_var_int(&mut out, 0x1_0000);
        assert_eq!(out[0], 0xfc);
        assert_eq!(out[1], 0xfd);
        assert_eq!(&out[2..4], &[0xfd, 0x00]);
        assert_eq!(out[4], 0xfe);
    }
}
