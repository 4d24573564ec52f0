//! Solana transaction compiler.
//!
//! Builds a legacy (non-versioned) message with a SystemProgram transfer
//! instruction and, when a memo is present, a Memo-program instruction. The
//! preimage is the serialized message itself: Solana's ed25519 signatures are
//! taken over the raw message bytes, not an external hash. The signed
//! transaction is the one-element signature array followed by the message.

use crate::compiler::{check_family, expect_unsigned, TxCompiler, UnsignedTx};
use crate::signature::{verified_eddsa_signature, SignatureShares};
use crate::{ChainFamily, ChainSpecificFee, Error, Result, SigningPayload};

/// SystemProgram id (all zeros)
const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];
/// SystemProgram::Transfer instruction tag
const TRANSFER_INSTRUCTION: u32 = 2;
/// SPL Memo program id
const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr";

/// Unsigned Solana transaction: the fully serialized message
#[derive(Debug, Clone)]
pub struct UnsignedSolanaTx {
    pub message: Vec<u8>,
    /// Sender account key, first entry of the account table
    pub from: [u8; 32],
}

/// Compiler for Solana
pub struct SolanaCompiler;

impl SolanaCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SolanaCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TxCompiler for SolanaCompiler {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    fn build_unsigned(&self, payload: &SigningPayload) -> Result<UnsignedTx> {
        check_family(payload, ChainFamily::Solana)?;
        let recent_blockhash = match &payload.fee {
            ChainSpecificFee::Solana { recent_blockhash } => recent_blockhash,
            _ => {
                return Err(Error::InvalidPayload(
                    "Solana payload requires a recent blockhash".to_string(),
                ))
            }
        };

        let from = decode_pubkey(&payload.coin.address)?;
        let to = decode_pubkey(&payload.to_address)?;
        let blockhash = decode_pubkey(recent_blockhash)
            .map_err(|_| Error::InvalidPayload("bad recent blockhash".to_string()))?;
        let lamports: u64 = payload
            .amount
            .try_into()
            .map_err(|_| Error::InvalidPayload("amount exceeds u64 range".to_string()))?;

        let mut accounts = vec![from, to, SYSTEM_PROGRAM_ID];
        let mut readonly_unsigned: u8 = 1;
        if payload.memo.is_some() {
            accounts.push(decode_pubkey(MEMO_PROGRAM_ID)?);
            readonly_unsigned = 2;
        }

        let mut message = Vec::new();
        // header: one signer, no readonly signed, trailing readonly programs
        message.push(1);
        message.push(0);
        message.push(readonly_unsigned);

        write_compact_u16(&mut message, accounts.len() as u16);
        for account in &accounts {
            message.extend_from_slice(account);
        }
        message.extend_from_slice(&blockhash);

        let n_instructions: u16 = if payload.memo.is_some() { 2 } else { 1 };
        write_compact_u16(&mut message, n_instructions);

        // SystemProgram::Transfer { lamports }
        message.push(2); // program id index
        write_compact_u16(&mut message, 2);
        message.push(0); // from
        message.push(1); // to
        let mut data = Vec::with_capacity(12);
        data.extend_from_slice(&TRANSFER_INSTRUCTION.to_le_bytes());
        data.extend_from_slice(&lamports.to_le_bytes());
        write_compact_u16(&mut message, data.len() as u16);
        message.extend_from_slice(&data);

        if let Some(memo) = &payload.memo {
            message.push(3); // memo program index
            write_compact_u16(&mut message, 0);
            write_compact_u16(&mut message, memo.len() as u16);
            message.extend_from_slice(memo.as_bytes());
        }

        Ok(UnsignedTx::Solana(UnsignedSolanaTx { message, from }))
    }

    fn preimage_hashes(&self, unsigned: &UnsignedTx) -> Result<Vec<Vec<u8>>> {
        let tx = expect_unsigned!(unsigned, Solana)?;
        Ok(vec![tx.message.clone()])
    }

    fn compile_signed(
        &self,
        unsigned: &UnsignedTx,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        let tx = expect_unsigned!(unsigned, Solana)?;
        let key: [u8; 32] = public_key
            .try_into()
            .map_err(|_| Error::InvalidPublicKey("Solana key must be 32 bytes".to_string()))?;
        if key != tx.from {
            return Err(Error::SignatureVerificationFailed(
                "public key does not match the fee payer account".to_string(),
            ));
        }
        let signature = verified_eddsa_signature(&tx.message, shares, &key)?;

        let mut out = Vec::with_capacity(1 + 64 + tx.message.len());
        write_compact_u16(&mut out, 1);
        out.extend_from_slice(&signature);
        out.extend_from_slice(&tx.message);
        Ok(hex::encode(out))
    }
}

fn decode_pubkey(encoded: &str) -> Result<[u8; 32]> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| Error::InvalidPayload(format!("bad base58 key: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidPayload("base58 key must be 32 bytes".to_string()))
}

/// Solana's compact-u16 length prefix
fn write_compact_u16(out: &mut Vec<u8>, mut value: u16) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Chain, Coin, SignatureShare};
    use ed25519_dalek::{Signer, SigningKey};

    fn sol_payload(key: &SigningKey, memo: Option<&str>) -> SigningPayload {
        let address = bs58::encode(key.verifying_key().to_bytes()).into_string();
        let coin = Coin::native(
            Chain::Solana,
            address,
            hex::encode(key.verifying_key().to_bytes()),
        );
        let mut payload = SigningPayload::new(
            coin,
            bs58::encode([9u8; 32]).into_string(),
            1_000_000_000, // 1 SOL
            ChainSpecificFee::Solana {
                recent_blockhash: bs58::encode([7u8; 32]).into_string(),
            },
        );
        if let Some(m) = memo {
            payload = payload.with_memo(m);
        }
        payload
    }

    #[test]
    fn test_single_preimage_is_message_bytes() {
        let compiler = SolanaCompiler::new();
        let key = SigningKey::from_bytes(&[41u8; 32]);
        let unsigned = compiler.build_unsigned(&sol_payload(&key, None)).unwrap();
        let preimages = compiler.preimage_hashes(&unsigned).unwrap();
        assert_eq!(preimages.len(), 1);
        match &unsigned {
            UnsignedTx::Solana(tx) => assert_eq!(preimages[0], tx.message),
            _ => panic!("wrong envelope"),
        }
    }

    #[test]
    fn test_message_header_and_accounts() {
        let compiler = SolanaCompiler::new();
        let key = SigningKey::from_bytes(&[41u8; 32]);
        let unsigned = compiler.build_unsigned(&sol_payload(&key, None)).unwrap();
        let tx = match &unsigned {
            UnsignedTx::Solana(tx) => tx,
            _ => panic!("wrong envelope"),
        };
        assert_eq!(&tx.message[..3], &[1, 0, 1]);
        assert_eq!(tx.message[3], 3); // three accounts, compact-u16 one byte
        assert_eq!(&tx.message[4..36], &key.verifying_key().to_bytes());
    }

    #[test]
    fn test_memo_adds_instruction() {
        let compiler = SolanaCompiler::new();
        let key = SigningKey::from_bytes(&[41u8; 32]);
        let unsigned = compiler
            .build_unsigned(&sol_payload(&key, Some("invoice 42")))
            .unwrap();
        let tx = match &unsigned {
            UnsignedTx::Solana(tx) => tx,
            _ => panic!("wrong envelope"),
        };
        assert_eq!(&tx.message[..3], &[1, 0, 2]);
        assert_eq!(tx.message[3], 4); // memo program joins the account table
        let msg_hex = hex::encode(&tx.message);
        assert!(msg_hex.contains(&hex::encode(b"invoice 42")));
    }

    #[test]
    fn test_signed_tx_layout() {
        let compiler = SolanaCompiler::new();
        let key = SigningKey::from_bytes(&[41u8; 32]);
        let unsigned = compiler.build_unsigned(&sol_payload(&key, None)).unwrap();
        let message = compiler.preimage_hashes(&unsigned).unwrap().remove(0);

        let sig = key.sign(&message);
        let mut shares = SignatureShares::new();
        shares.insert(
            hex::encode(&message),
            SignatureShare {
                msg: hex::encode(&message),
                r: hex::encode(&sig.to_bytes()[..32]),
                s: hex::encode(&sig.to_bytes()[32..]),
                der_signature: String::new(),
                recovery_id: String::new(),
            },
        );

        let raw_hex = compiler
            .compile_signed(&unsigned, &shares, &key.verifying_key().to_bytes())
            .unwrap();
        let raw = hex::decode(&raw_hex).unwrap();
        assert_eq!(raw[0], 1); // one signature
        assert_eq!(&raw[1..65], &sig.to_bytes());
        assert_eq!(&raw[65..], &message[..]);
    }

    #[test]
    fn test_foreign_fee_payer_rejected() {
        let compiler = SolanaCompiler::new();
        let key = SigningKey::from_bytes(&[41u8; 32]);
        let other = SigningKey::from_bytes(&[42u8; 32]);
        let unsigned = compiler.build_unsigned(&sol_payload(&key, None)).unwrap();
        let err = compiler
            .compile_signed(
                &unsigned,
                &SignatureShares::new(),
                &other.verifying_key().to_bytes(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::SignatureVerificationFailed(_)));
    }
}
