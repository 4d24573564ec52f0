//! Sui transaction compiler.
//!
//! Serializes a pay-SUI transaction in a compact BCS form (version byte,
//! sender, pay variant, gas payment/budget/price, expiration) and signs the
//! blake2b-256 digest of the intent message `[0, 0, 0] || tx`. The signed
//! transaction appends the standard 97-byte serialized signature
//! `flag(0x00) || sig || pubkey` to the transaction bytes.

use crate::compiler::{check_family, expect_unsigned, TxCompiler, UnsignedTx};
use crate::signature::{verified_eddsa_signature, SignatureShares};
use crate::{ChainFamily, ChainSpecificFee, Error, Result, SigningPayload};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};

/// Unsigned Sui transaction
#[derive(Debug, Clone)]
pub struct UnsignedSuiTx {
    pub sender: [u8; 32],
    pub recipient: [u8; 32],
    pub amount: u64,
    pub gas_object: ([u8; 32], u64, [u8; 32]),
    pub gas_budget: u64,
    pub gas_price: u64,
}

impl UnsignedSuiTx {
    /// Compact BCS serialization of the transaction data
    fn serialize(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(0); // version

        data.extend_from_slice(&self.sender);

        // pay-SUI variant: one recipient, one amount
        data.push(0x00);
        data.push(1);
        data.extend_from_slice(&self.recipient);
        data.push(1);
        data.extend_from_slice(&self.amount.to_le_bytes());

        let (object_id, version, digest) = &self.gas_object;
        data.extend_from_slice(object_id);
        data.extend_from_slice(&version.to_le_bytes());
        data.extend_from_slice(digest);

        data.extend_from_slice(&self.gas_budget.to_le_bytes());
        data.extend_from_slice(&self.gas_price.to_le_bytes());

        data.push(0); // no expiration epoch
        data
    }

    /// blake2b-256 over the intent message
    fn digest(&self) -> [u8; 32] {
        let mut hasher = Blake2b::<U32>::new();
        // intent: scope TransactionData, version 0, app id Sui
        hasher.update([0, 0, 0]);
        hasher.update(self.serialize());
        hasher.finalize().into()
    }
}

/// Compiler for Sui
pub struct SuiCompiler;

impl SuiCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SuiCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TxCompiler for SuiCompiler {
    fn family(&self) -> ChainFamily {
        ChainFamily::Sui
    }

    fn build_unsigned(&self, payload: &SigningPayload) -> Result<UnsignedTx> {
        check_family(payload, ChainFamily::Sui)?;
        let (reference_gas_price, gas_budget, gas_object) = match &payload.fee {
            ChainSpecificFee::Sui {
                reference_gas_price,
                gas_budget,
                gas_object,
            } => (*reference_gas_price, *gas_budget, gas_object),
            _ => {
                return Err(Error::InvalidPayload(
                    "Sui payload requires gas parameters".to_string(),
                ))
            }
        };

        let sender = decode_sui_address(&payload.coin.address)?;
        let recipient = decode_sui_address(&payload.to_address)?;
        let amount: u64 = payload
            .amount
            .try_into()
            .map_err(|_| Error::InvalidPayload("amount exceeds u64 range".to_string()))?;

        let (object_hex, object_version, digest_b58) = gas_object;
        let object_id = decode_sui_address(object_hex)?;
        let digest: [u8; 32] = bs58::decode(digest_b58)
            .into_vec()
            .map_err(|e| Error::InvalidPayload(format!("bad gas object digest: {e}")))?
            .try_into()
            .map_err(|_| Error::InvalidPayload("gas object digest must be 32 bytes".to_string()))?;

        Ok(UnsignedTx::Sui(UnsignedSuiTx {
            sender,
            recipient,
            amount,
            gas_object: (object_id, *object_version, digest),
            gas_budget,
            gas_price: reference_gas_price,
        }))
    }

    fn preimage_hashes(&self, unsigned: &UnsignedTx) -> Result<Vec<Vec<u8>>> {
        let tx = expect_unsigned!(unsigned, Sui)?;
        Ok(vec![tx.digest().to_vec()])
    }

    fn compile_signed(
        &self,
        unsigned: &UnsignedTx,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        let tx = expect_unsigned!(unsigned, Sui)?;
        let key: [u8; 32] = public_key
            .try_into()
            .map_err(|_| Error::InvalidPublicKey("Sui key must be 32 bytes".to_string()))?;

        // the signing key must hash to the sender address
        let mut hasher = Blake2b::<U32>::new();
        hasher.update([0x00]);
        hasher.update(key);
        let derived: [u8; 32] = hasher.finalize().into();
        if derived != tx.sender {
            return Err(Error::SignatureVerificationFailed(
                "public key does not match the sender address".to_string(),
            ));
        }

        let digest = tx.digest();
        let signature = verified_eddsa_signature(&digest, shares, &key)?;

        let mut out = tx.serialize();
        out.push(0x00); // ed25519 scheme flag
        out.extend_from_slice(&signature);
        out.extend_from_slice(&key);
        Ok(hex::encode(out))
    }
}

fn decode_sui_address(address: &str) -> Result<[u8; 32]> {
    let stripped = address.strip_prefix("0x").unwrap_or(address);
    let bytes = hex::decode(stripped)
        .map_err(|e| Error::InvalidPayload(format!("bad Sui address: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidPayload("Sui address must be 32 bytes".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Chain, Coin, SignatureShare};
    use ed25519_dalek::{Signer, SigningKey};

    fn sui_payload(key: &SigningKey) -> SigningPayload {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update([0x00]);
        hasher.update(key.verifying_key().to_bytes());
        let sender: [u8; 32] = hasher.finalize().into();

        let coin = Coin::native(
            Chain::Sui,
            format!("0x{}", hex::encode(sender)),
            hex::encode(key.verifying_key().to_bytes()),
        );
        SigningPayload::new(
            coin,
            format!("0x{}", hex::encode([3u8; 32])),
            5_000_000_000u128,
            ChainSpecificFee::Sui {
                reference_gas_price: 1_000,
                gas_budget: 5_000_000,
                gas_object: (
                    format!("0x{}", hex::encode([4u8; 32])),
                    11,
                    bs58::encode([5u8; 32]).into_string(),
                ),
            },
        )
    }

    #[test]
    fn test_single_blake2b_preimage() {
        let compiler = SuiCompiler::new();
        let key = SigningKey::from_bytes(&[51u8; 32]);
        let unsigned = compiler.build_unsigned(&sui_payload(&key)).unwrap();
        let preimages = compiler.preimage_hashes(&unsigned).unwrap();
        assert_eq!(preimages.len(), 1);
        assert_eq!(preimages[0].len(), 32);
    }

    #[test]
    fn test_digest_covers_intent_prefix() {
        let key = SigningKey::from_bytes(&[51u8; 32]);
        let compiler = SuiCompiler::new();
        let unsigned = compiler.build_unsigned(&sui_payload(&key)).unwrap();
        let tx = match &unsigned {
            UnsignedTx::Sui(tx) => tx,
            _ => panic!("wrong envelope"),
        };
        // digest differs from hashing the bare tx bytes
        let mut bare = Blake2b::<U32>::new();
        bare.update(tx.serialize());
        let bare: [u8; 32] = bare.finalize().into();
        assert_ne!(tx.digest(), bare);
    }

    #[test]
    fn test_signed_tx_carries_scheme_flag_and_key() {
        let compiler = SuiCompiler::new();
        let key = SigningKey::from_bytes(&[51u8; 32]);
        let unsigned = compiler.build_unsigned(&sui_payload(&key)).unwrap();
        let digest = compiler.preimage_hashes(&unsigned).unwrap().remove(0);

        let sig = key.sign(&digest);
        let mut shares = SignatureShares::new();
        shares.insert(
            hex::encode(&digest),
            SignatureShare {
                msg: hex::encode(&digest),
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
        let tail = &raw[raw.len() - 97..];
        assert_eq!(tail[0], 0x00);
        assert_eq!(&tail[1..65], &sig.to_bytes());
        assert_eq!(&tail[65..], &key.verifying_key().to_bytes());
    }

    #[test]
    fn test_mismatched_sender_rejected() {
        let compiler = SuiCompiler::new();
        let key = SigningKey::from_bytes(&[51u8; 32]);
        let other = SigningKey::from_bytes(&[52u8; 32]);
        let unsigned = compiler.build_unsigned(&sui_payload(&key)).unwrap();
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
