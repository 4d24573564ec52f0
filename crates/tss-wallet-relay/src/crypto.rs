//! Message encryption for relay bodies.
//!
//! One canonical scheme: AES-256-GCM with the key derived as SHA-256 of the
//! hex-decoded session key, and a random 12-byte nonce prepended to the
//! ciphertext (combined format). Mixing cipher modes within a session is not
//! supported; peers that cannot speak this scheme cannot join the session.

use crate::{RelayError, Result};
use aes_gcm::aead::{Aead, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, KeyInit, Nonce};
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;

/// AES-256-GCM codec bound to one session key
#[derive(Clone)]
pub struct MessageCrypto {
    key: [u8; 32],
}

impl MessageCrypto {
    /// Build from the session's hex-encoded shared key.
    ///
    /// The key material is the SHA-256 digest of the decoded bytes, so any
    /// hex string yields a full-strength 256-bit key.
    pub fn from_hex_key(hex_key: &str) -> Result<Self> {
        let decoded = hex::decode(hex_key)
            .map_err(|e| RelayError::Decryption(format!("bad session key hex: {e}")))?;
        let key: [u8; 32] = Sha256::digest(&decoded).into();
        Ok(Self { key })
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext`
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|e| RelayError::Internal(format!("encryption failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt `nonce || ciphertext`
    pub fn decrypt(&self, combined: &[u8]) -> Result<Vec<u8>> {
        if combined.len() <= NONCE_LEN {
            return Err(RelayError::Decryption("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = combined.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| RelayError::Decryption("bad key or corrupted ciphertext".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_HEX: &str = "aabbccddeeff00112233445566778899aabbccddeeff00112233445566778899";

    #[test]
    fn test_roundtrip() {
        let crypto = MessageCrypto::from_hex_key(KEY_HEX).unwrap();
        let sealed = crypto.encrypt(b"round 2 broadcast").unwrap();
        assert_eq!(crypto.decrypt(&sealed).unwrap(), b"round 2 broadcast");
    }

    #[test]
    fn test_nonce_uniqueness() {
        let crypto = MessageCrypto::from_hex_key(KEY_HEX).unwrap();
        let a = crypto.encrypt(b"same plaintext").unwrap();
        let b = crypto.encrypt(b"same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let crypto = MessageCrypto::from_hex_key(KEY_HEX).unwrap();
        let other = MessageCrypto::from_hex_key("00ff").unwrap();
        let sealed = crypto.encrypt(b"secret").unwrap();
        assert!(matches!(
            other.decrypt(&sealed),
            Err(RelayError::Decryption(_))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let crypto = MessageCrypto::from_hex_key(KEY_HEX).unwrap();
        let mut sealed = crypto.encrypt(b"secret").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            crypto.decrypt(&sealed),
            Err(RelayError::Decryption(_))
        ));
    }

    #[test]
    fn test_short_input_rejected() {
        let crypto = MessageCrypto::from_hex_key(KEY_HEX).unwrap();
        assert!(crypto.decrypt(&[0u8; 12]).is_err());
    }
}
