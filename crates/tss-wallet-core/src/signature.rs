//! Signature assembly and verification.
//!
//! The threshold engine returns one [`SignatureShare`] per preimage, keyed by
//! the hex of the preimage it signs. This module extracts the byte encoding a
//! chain's wire format needs and enforces the verification gate: no signature
//! leaves this module unverified, so a stale unsigned transaction, a
//! corrupted relay message or a mismatched key surfaces as
//! [`Error::SignatureVerificationFailed`] instead of a broadcastable but
//! invalid transaction.

use crate::{Error, Result, SignatureShare};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature as EcdsaSignature, VerifyingKey};
use std::collections::HashMap;
use tracing::debug;

/// Byte encoding requested from a signature share
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    /// ASN.1 DER `(r, s)`, used by UTXO chains
    Der,
    /// 65-byte `r || s || recovery_id`, used by EIP-1559 transactions
    RawWithRecoveryId,
    /// 64-byte `r || s` without recovery information (Cosmos raw ECDSA and
    /// all EdDSA chains)
    RawEddsa,
}

/// Shares keyed by hex-encoded preimage
pub type SignatureShares = HashMap<String, SignatureShare>;

/// Look up the share for `preimage` and return it in `encoding`.
///
/// A missing share is a retryable condition ([`Error::SignatureUnavailable`]):
/// the engine simply has not produced it yet. Malformed share bytes are
/// reported as [`Error::InvalidSignature`].
pub fn signature_for(
    preimage: &[u8],
    shares: &SignatureShares,
    encoding: SignatureEncoding,
) -> Result<Vec<u8>> {
    let key = hex::encode(preimage);
    let share = match shares.get(&key) {
        Some(share) => share,
        None => {
            debug!(preimage = %key, "no signature share yet");
            return Err(Error::SignatureUnavailable(key));
        }
    };

    match encoding {
        SignatureEncoding::Der => {
            let der = hex::decode(&share.der_signature)
                .map_err(|e| Error::InvalidSignature(e.to_string()))?;
            if der.is_empty() {
                return Err(Error::InvalidSignature("empty DER signature".to_string()));
            }
            Ok(der)
        }
        SignatureEncoding::RawWithRecoveryId => {
            let mut raw = share.raw_bytes()?;
            let recovery = hex::decode(&share.recovery_id)
                .map_err(|e| Error::InvalidSignature(e.to_string()))?;
            let recovery_id = *recovery
                .first()
                .ok_or_else(|| Error::InvalidSignature("missing recovery id".to_string()))?;
            if recovery_id > 3 {
                return Err(Error::InvalidSignature(format!(
                    "recovery id {recovery_id} out of range"
                )));
            }
            raw.push(recovery_id);
            Ok(raw)
        }
        SignatureEncoding::RawEddsa => share.raw_bytes(),
    }
}

// ============ Verification ============

/// Verify a 64-byte `r || s` ECDSA signature over a 32-byte prehash.
pub fn verify_ecdsa(public_key: &[u8], preimage: &[u8], signature: &[u8]) -> Result<()> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let sig = EcdsaSignature::from_slice(&signature[..64.min(signature.len())])
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    verifying_key
        .verify_prehash(preimage, &sig)
        .map_err(|_| {
            Error::SignatureVerificationFailed(format!(
                "ECDSA signature does not match preimage {}",
                hex::encode(preimage)
            ))
        })
}

/// Verify a DER-encoded ECDSA signature over a 32-byte prehash.
pub fn verify_ecdsa_der(public_key: &[u8], preimage: &[u8], der: &[u8]) -> Result<()> {
    let verifying_key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let sig = EcdsaSignature::from_der(der)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    verifying_key.verify_prehash(preimage, &sig).map_err(|_| {
        Error::SignatureVerificationFailed(format!(
            "DER signature does not match preimage {}",
            hex::encode(preimage)
        ))
    })
}

/// Verify a 64-byte EdDSA signature over `message` (EdDSA signs the message
/// bytes themselves, not an external hash).
pub fn verify_eddsa(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> Result<()> {
    use ed25519_dalek::{Signature as EdSignature, VerifyingKey as EdVerifyingKey};

    let verifying_key = EdVerifyingKey::from_bytes(public_key)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| Error::InvalidSignature("EdDSA signature must be 64 bytes".to_string()))?;
    let sig = EdSignature::from_bytes(&sig_bytes);
    verifying_key.verify_strict(message, &sig).map_err(|_| {
        Error::SignatureVerificationFailed(format!(
            "EdDSA signature does not match message {}",
            hex::encode(message)
        ))
    })
}

/// Fetch the DER signature for `preimage` and verify it before release.
pub fn verified_der_signature(
    preimage: &[u8],
    shares: &SignatureShares,
    public_key: &[u8],
) -> Result<Vec<u8>> {
    let der = signature_for(preimage, shares, SignatureEncoding::Der)?;
    verify_ecdsa_der(public_key, preimage, &der)?;
    Ok(der)
}

/// Fetch the recoverable signature for `preimage` and verify its `r || s`
/// part before release.
pub fn verified_recoverable_signature(
    preimage: &[u8],
    shares: &SignatureShares,
    public_key: &[u8],
) -> Result<Vec<u8>> {
    let sig = signature_for(preimage, shares, SignatureEncoding::RawWithRecoveryId)?;
    verify_ecdsa(public_key, preimage, &sig[..64])?;
    Ok(sig)
}

/// Fetch the raw 64-byte ECDSA signature for `preimage` and verify it.
pub fn verified_raw_ecdsa_signature(
    preimage: &[u8],
    shares: &SignatureShares,
    public_key: &[u8],
) -> Result<Vec<u8>> {
    let sig = signature_for(preimage, shares, SignatureEncoding::RawEddsa)?;
    verify_ecdsa(public_key, preimage, &sig)?;
    Ok(sig)
}

/// Fetch the raw 64-byte EdDSA signature for `preimage` and verify it.
pub fn verified_eddsa_signature(
    preimage: &[u8],
    shares: &SignatureShares,
    public_key: &[u8; 32],
) -> Result<Vec<u8>> {
    let sig = signature_for(preimage, shares, SignatureEncoding::RawEddsa)?;
    verify_eddsa(public_key, preimage, &sig)?;
    Ok(sig)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::{signature::hazmat::PrehashSigner, SigningKey};

    fn share_for(preimage: &[u8], signing_key: &SigningKey) -> SignatureShare {
        let sig: EcdsaSignature = signing_key.sign_prehash(preimage).unwrap();
        let bytes = sig.to_bytes();
        SignatureShare {
            msg: hex::encode(preimage),
            r: hex::encode(&bytes[..32]),
            s: hex::encode(&bytes[32..]),
            der_signature: hex::encode(sig.to_der().as_bytes()),
            recovery_id: "00".to_string(),
        }
    }

    fn test_key() -> SigningKey {
        SigningKey::from_slice(&[7u8; 32]).unwrap()
    }

    #[test]
    fn test_missing_share_is_unavailable() {
        let shares = SignatureShares::new();
        let err = signature_for(&[1u8; 32], &shares, SignatureEncoding::Der).unwrap_err();
        assert!(matches!(err, Error::SignatureUnavailable(_)));
    }

    #[test]
    fn test_der_signature_verifies() {
        let key = test_key();
        let preimage = [9u8; 32];
        let mut shares = SignatureShares::new();
        shares.insert(hex::encode(preimage), share_for(&preimage, &key));

        let public_key = key.verifying_key().to_sec1_bytes();
        let der = verified_der_signature(&preimage, &shares, &public_key).unwrap();
        assert!(!der.is_empty());
    }

    #[test]
    fn test_recoverable_signature_is_65_bytes() {
        let key = test_key();
        let preimage = [3u8; 32];
        let mut shares = SignatureShares::new();
        shares.insert(hex::encode(preimage), share_for(&preimage, &key));

        let public_key = key.verifying_key().to_sec1_bytes();
        let sig = verified_recoverable_signature(&preimage, &shares, &public_key).unwrap();
        assert_eq!(sig.len(), 65);
        assert_eq!(sig[64], 0);
    }

    #[test]
    fn test_wrong_preimage_share_fails_verification() {
        let key = test_key();
        let signed = [1u8; 32];
        let requested = [2u8; 32];
        // share signs a different preimage than it claims to
        let mut shares = SignatureShares::new();
        shares.insert(hex::encode(requested), share_for(&signed, &key));

        let public_key = key.verifying_key().to_sec1_bytes();
        let err = verified_der_signature(&requested, &shares, &public_key).unwrap_err();
        assert!(matches!(err, Error::SignatureVerificationFailed(_)));
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let key = test_key();
        let other = SigningKey::from_slice(&[8u8; 32]).unwrap();
        let preimage = [4u8; 32];
        let mut shares = SignatureShares::new();
        shares.insert(hex::encode(preimage), share_for(&preimage, &key));

        let public_key = other.verifying_key().to_sec1_bytes();
        let err = verified_der_signature(&preimage, &shares, &public_key).unwrap_err();
        assert!(matches!(err, Error::SignatureVerificationFailed(_)));
    }

    #[test]
    fn test_eddsa_verification() {
        use ed25519_dalek::{Signer, SigningKey as EdSigningKey};

        let key = EdSigningKey::from_bytes(&[5u8; 32]);
        let message = b"payload bytes".to_vec();
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

        let public_key = key.verifying_key().to_bytes();
        assert!(verified_eddsa_signature(&message, &shares, &public_key).is_ok());

        // flipping one message byte must fail the gate
        let mut tampered = message.clone();
        tampered[0] ^= 0xff;
        shares.insert(
            hex::encode(&tampered),
            shares[&hex::encode(&message)].clone(),
        );
        let err = verified_eddsa_signature(&tampered, &shares, &public_key).unwrap_err();
        assert!(matches!(err, Error::SignatureVerificationFailed(_)));
    }

    #[test]
    fn test_out_of_range_recovery_id_rejected() {
        let key = test_key();
        let preimage = [6u8; 32];
        let mut share = share_for(&preimage, &key);
        share.recovery_id = "07".to_string();
        let mut shares = SignatureShares::new();
        shares.insert(hex::encode(preimage), share);

        let err =
            signature_for(&preimage, &shares, SignatureEncoding::RawWithRecoveryId).unwrap_err();
        assert!(matches!(err, Error::InvalidSignature(_)));
    }
}
