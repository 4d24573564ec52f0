//! Public key derivation and address encoding.
//!
//! The vault exposes only a root *public* key plus a chain code, so all HD
//! derivation here is the public half of BIP32: per path component,
//! `HMAC-SHA512(chain_code, parent_compressed || index_be)` yields a tweak
//! scalar and the next chain code, and the child point is
//! `parent + tweak * G`. Hardened markers in the well-known per-chain paths
//! denote conventional account boundaries only; the arithmetic is always
//! non-hardened because no secret key is available.
//!
//! EdDSA chains (Solana, Sui, TON, Polkadot) carry no HD step in this wallet
//! model: the 32-byte root EdDSA key is the signing key. Solana additionally
//! reverses the byte order of the root key before use, an artifact of how the
//! engine serializes Edwards points.

use crate::{Chain, Error, Result, SignatureAlgorithm};
use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{ProjectivePoint, PublicKey, Scalar};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};

// ============ Child Key Derivation ============

/// Derive a non-hardened BIP32 child public key along `path`.
///
/// `root_pub_hex` must be a 33-byte compressed secp256k1 point and
/// `chain_code_hex` a 32-byte chain code, both hex-encoded. Returns the
/// compressed child key as hex.
pub fn derive_child_public_key(
    root_pub_hex: &str,
    chain_code_hex: &str,
    path: &str,
) -> Result<String> {
    use derivation_path::{ChildIndex, DerivationPath};

    let derivation_path: DerivationPath = path
        .parse()
        .map_err(|e| Error::Derivation(format!("invalid path {path}: {e}")))?;

    let mut point = parse_point(root_pub_hex)?;
    let mut chain_code: [u8; 32] = hex::decode(chain_code_hex)?
        .try_into()
        .map_err(|_| Error::Derivation("chain code must be 32 bytes".to_string()))?;

    for child_index in derivation_path.into_iter() {
        let index = match child_index {
            ChildIndex::Normal(idx) | ChildIndex::Hardened(idx) => *idx,
        };
        let (next, next_code) = derive_step(&point, &chain_code, index)?;
        point = next;
        chain_code = next_code;
    }

    Ok(hex::encode(compress(&point)?))
}

/// One CKDpub step
fn derive_step(
    parent: &ProjectivePoint,
    chain_code: &[u8; 32],
    index: u32,
) -> Result<(ProjectivePoint, [u8; 32])> {
    let mut hmac = Hmac::<Sha512>::new_from_slice(chain_code)
        .map_err(|e| Error::Derivation(e.to_string()))?;
    hmac.update(&compress(parent)?);
    hmac.update(&index.to_be_bytes());
    let digest = hmac.finalize().into_bytes();

    let tweak_bytes: [u8; 32] = digest[..32]
        .try_into()
        .map_err(|_| Error::Internal("hmac output truncated".to_string()))?;
    let tweak = Option::<Scalar>::from(Scalar::from_repr(tweak_bytes.into()))
        .ok_or_else(|| Error::Derivation("tweak exceeds group order".to_string()))?;
    let next_code: [u8; 32] = digest[32..]
        .try_into()
        .map_err(|_| Error::Internal("hmac output truncated".to_string()))?;

    let child = *parent + ProjectivePoint::GENERATOR * tweak;
    if child == ProjectivePoint::IDENTITY {
        return Err(Error::Derivation("derived point at infinity".to_string()));
    }
    Ok((child, next_code))
}

fn parse_point(hex_pub: &str) -> Result<ProjectivePoint> {
    let bytes = hex::decode(hex_pub)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let key = PublicKey::from_sec1_bytes(&bytes)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    Ok(key.to_projective())
}

fn compress(point: &ProjectivePoint) -> Result<[u8; 33]> {
    let encoded = point.to_affine().to_encoded_point(true);
    encoded
        .as_bytes()
        .try_into()
        .map_err(|_| Error::Internal("unexpected point encoding length".to_string()))
}

/// EdDSA signing key for `chain`, taken directly from the root key.
pub fn eddsa_public_key(root_pub_hex: &str, chain: Chain) -> Result<[u8; 32]> {
    if chain.signature_algorithm() != SignatureAlgorithm::Eddsa {
        return Err(Error::UnsupportedChain(format!(
            "{chain} is not an EdDSA chain"
        )));
    }
    let bytes = hex::decode(root_pub_hex).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let mut key: [u8; 32] = bytes
        .try_into()
        .map_err(|_| Error::InvalidPublicKey("EdDSA key must be 32 bytes".to_string()))?;
    if chain == Chain::Solana {
        key.reverse();
    }
    Ok(key)
}

/// Derive the chain's child key (ECDSA) or normalized root key (EdDSA) and
/// encode its address in one step.
pub fn derive_address(root_pub_hex: &str, chain_code_hex: &str, chain: Chain) -> Result<String> {
    let pub_hex = match chain.signature_algorithm() {
        SignatureAlgorithm::Ecdsa => {
            derive_child_public_key(root_pub_hex, chain_code_hex, chain.derivation_path())?
        }
        SignatureAlgorithm::Eddsa => hex::encode(eddsa_public_key(root_pub_hex, chain)?),
    };
    address_from_public_key(&pub_hex, chain)
}

// ============ Address Encoding ============

/// Encode `hex_pub` as the chain's canonical address form.
///
/// Returns [`Error::InvalidPublicKey`] for malformed keys and
/// [`Error::UnsupportedChain`] is reserved for chains outside the closed set
/// (unreachable through the public enum, kept for parity with string-driven
/// callers).
pub fn address_from_public_key(hex_pub: &str, chain: Chain) -> Result<String> {
    match chain {
        Chain::Bitcoin => segwit_address("bc", hex_pub),
        Chain::Litecoin => segwit_address("ltc", hex_pub),
        Chain::BitcoinCash => base58check_address(0x00, hex_pub),
        Chain::Dogecoin => base58check_address(0x1e, hex_pub),
        Chain::Dash => base58check_address(0x4c, hex_pub),
        Chain::Ethereum | Chain::Avalanche | Chain::BscChain => evm_address(hex_pub),
        Chain::ThorChain => cosmos_address("thor", hex_pub),
        Chain::GaiaChain => cosmos_address("cosmos", hex_pub),
        Chain::Solana => solana_address(hex_pub),
        Chain::Sui => sui_address(hex_pub),
        Chain::Ton => ton_address(hex_pub),
        Chain::Polkadot => polkadot_address(hex_pub),
    }
}

fn decode_secp256k1(hex_pub: &str) -> Result<[u8; 33]> {
    let bytes = hex::decode(hex_pub).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    // round-trip through k256 to reject off-curve points
    let key = PublicKey::from_sec1_bytes(&bytes)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let compressed = key.to_encoded_point(true);
    compressed
        .as_bytes()
        .try_into()
        .map_err(|_| Error::InvalidPublicKey("unexpected point length".to_string()))
}

fn decode_ed25519(hex_pub: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_pub).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| Error::InvalidPublicKey("EdDSA key must be 32 bytes".to_string()))
}

/// ripemd160(sha256(data))
pub(crate) fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// sha256(sha256(data))
pub(crate) fn sha256d(data: &[u8]) -> [u8; 32] {
    Sha256::digest(Sha256::digest(data)).into()
}

fn segwit_address(hrp: &str, hex_pub: &str) -> Result<String> {
    use bech32::{ToBase32, Variant};

    let key = decode_secp256k1(hex_pub)?;
    let program = hash160(&key);
    let mut data = vec![bech32::u5::try_from_u8(0)
        .map_err(|e| Error::Internal(e.to_string()))?];
    data.extend(program.to_base32());
    bech32::encode(hrp, data, Variant::Bech32)
        .map_err(|e| Error::EncodingFailure(e.to_string()))
}

fn base58check_address(version: u8, hex_pub: &str) -> Result<String> {
    let key = decode_secp256k1(hex_pub)?;
    let mut payload = vec![version];
    payload.extend_from_slice(&hash160(&key));
    let checksum = sha256d(&payload);
    payload.extend_from_slice(&checksum[..4]);
    Ok(bs58::encode(payload).into_string())
}

fn evm_address(hex_pub: &str) -> Result<String> {
    let bytes = hex::decode(hex_pub).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let key = PublicKey::from_sec1_bytes(&bytes)
        .map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
    let uncompressed = key.to_encoded_point(false);
    let hash = keccak256(&uncompressed.as_bytes()[1..]);
    Ok(eip55_checksum(&hash[12..]))
}

/// EIP-55 mixed-case checksum encoding
fn eip55_checksum(address: &[u8]) -> String {
    let lower = hex::encode(address);
    let hash = keccak256(lower.as_bytes());
    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.chars().enumerate() {
        let nibble = (hash[i / 2] >> (4 * (1 - i % 2))) & 0x0f;
        if c.is_ascii_alphabetic() && nibble >= 8 {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn cosmos_address(hrp: &str, hex_pub: &str) -> Result<String> {
    use bech32::{ToBase32, Variant};

    let key = decode_secp256k1(hex_pub)?;
    let hash = hash160(&key);
    bech32::encode(hrp, hash.to_base32(), Variant::Bech32)
        .map_err(|e| Error::EncodingFailure(e.to_string()))
}

fn solana_address(hex_pub: &str) -> Result<String> {
    let key = decode_ed25519(hex_pub)?;
    Ok(bs58::encode(key).into_string())
}

fn sui_address(hex_pub: &str) -> Result<String> {
    use blake2::digest::consts::U32;
    use blake2::{Blake2b, Digest as _};

    let key = decode_ed25519(hex_pub)?;
    // flag byte 0x00 = ed25519 scheme
    let mut hasher = Blake2b::<U32>::new();
    hasher.update([0x00]);
    hasher.update(key);
    let hash: [u8; 32] = hasher.finalize().into();
    Ok(format!("0x{}", hex::encode(hash)))
}

/// TON wallet-v4r2 mainnet wallet id
pub(crate) const TON_WALLET_ID: u32 = 698983191;

/// Hash of the account state that deploying the v4r2 wallet contract for
/// `public_key` would create. The address is this hash plus the workchain.
pub(crate) fn ton_state_init_hash(public_key: &[u8; 32]) -> [u8; 32] {
    // v4r2 code cell hash, mainnet
    const WALLET_CODE_HASH: [u8; 32] = [
        0xfe, 0xb5, 0xff, 0x68, 0x20, 0xe2, 0xff, 0x0d, 0x94, 0x83, 0xe7, 0xe0, 0xd6, 0x2c,
        0x81, 0x7d, 0x84, 0x67, 0x89, 0xfb, 0x4a, 0xe5, 0x80, 0xc8, 0x78, 0x86, 0x6d, 0x95,
        0x9d, 0xab, 0xd5, 0xc0,
    ];
    let mut hasher = Sha256::new();
    hasher.update(WALLET_CODE_HASH);
    hasher.update(TON_WALLET_ID.to_be_bytes());
    hasher.update(public_key);
    hasher.finalize().into()
}

fn ton_address(hex_pub: &str) -> Result<String> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let key = decode_ed25519(hex_pub)?;
    let hash = ton_state_init_hash(&key);

    // non-bounceable user-friendly form, workchain 0
    let mut data = Vec::with_capacity(36);
    data.push(0x51);
    data.push(0x00);
    data.extend_from_slice(&hash);
    let crc = crc16_ccitt(&data);
    data.extend_from_slice(&crc.to_be_bytes());
    Ok(URL_SAFE_NO_PAD.encode(data))
}

/// CRC16-CCITT, as used by TON address checksums
pub(crate) fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for byte in data {
        crc ^= (*byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

fn polkadot_address(hex_pub: &str) -> Result<String> {
    use blake2::{Blake2b512, Digest as _};

    let key = decode_ed25519(hex_pub)?;
    // SS58 network prefix 0 = Polkadot
    let mut data = vec![0x00];
    data.extend_from_slice(&key);

    let mut hasher = Blake2b512::new();
    hasher.update(b"SS58PRE");
    hasher.update(&data);
    let checksum = hasher.finalize();

    data.extend_from_slice(&checksum[..2]);
    Ok(bs58::encode(data).into_string())
}

/// keccak-256
pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    use tiny_keccak::{Hasher, Keccak};

    let mut keccak = Keccak::v256();
    let mut output = [0u8; 32];
    keccak.update(data);
    keccak.finalize(&mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    // generator point: a valid compressed key with known encodings
    const GEN_PUB: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";
    const CHAIN_CODE: &str =
        "873dff81c02f525623fd1fe5167eac3a55a049de3d314bb42ee227ffed37d508";
    const ED_PUB: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    #[test]
    fn test_derivation_is_deterministic() {
        let a = derive_child_public_key(GEN_PUB, CHAIN_CODE, "m/44'/60'/0'/0/0").unwrap();
        let b = derive_child_public_key(GEN_PUB, CHAIN_CODE, "m/44'/60'/0'/0/0").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 66);
        assert_ne!(a, GEN_PUB);
    }

    #[test]
    fn test_different_paths_differ() {
        let a = derive_child_public_key(GEN_PUB, CHAIN_CODE, "m/0/1").unwrap();
        let b = derive_child_public_key(GEN_PUB, CHAIN_CODE, "m/0/2").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        assert!(matches!(
            derive_child_public_key("02zz", CHAIN_CODE, "m/0"),
            Err(Error::InvalidPublicKey(_))
        ));
        assert!(matches!(
            derive_child_public_key(GEN_PUB, "abcd", "m/0"),
            Err(Error::Derivation(_)) | Err(Error::Deserialization(_))
        ));
        assert!(derive_child_public_key(GEN_PUB, CHAIN_CODE, "not a path").is_err());
    }

    #[test]
    fn test_bitcoin_address_shape() {
        let addr = address_from_public_key(GEN_PUB, Chain::Bitcoin).unwrap();
        assert!(addr.starts_with("bc1q"));
        let ltc = address_from_public_key(GEN_PUB, Chain::Litecoin).unwrap();
        assert!(ltc.starts_with("ltc1q"));
    }

    #[test]
    fn test_dogecoin_address_version() {
        let addr = address_from_public_key(GEN_PUB, Chain::Dogecoin).unwrap();
        // version 0x1e encodes to a leading 'D'
        assert!(addr.starts_with('D'));
    }

    #[test]
    fn test_evm_address_checksummed() {
        let addr = address_from_public_key(GEN_PUB, Chain::Ethereum).unwrap();
        assert_eq!(addr.len(), 42);
        assert!(addr.starts_with("0x"));
        assert!(addr[2..].chars().any(|c| c.is_ascii_uppercase()));
        // checksum casing must survive a round trip through lowercase
        let lower = addr.to_lowercase();
        let hash = hex::decode(&lower[2..]).unwrap();
        assert_eq!(addr, eip55_checksum(&hash));
    }

    #[test]
    fn test_thorchain_address_hrp() {
        let addr = address_from_public_key(GEN_PUB, Chain::ThorChain).unwrap();
        assert!(addr.starts_with("thor1"));
    }

    #[test]
    fn test_solana_root_key_is_reversed() {
        let key = eddsa_public_key(ED_PUB, Chain::Solana).unwrap();
        let mut expected = decode_ed25519(ED_PUB).unwrap();
        expected.reverse();
        assert_eq!(key, expected);
        // Sui keeps the original byte order
        let sui = eddsa_public_key(ED_PUB, Chain::Sui).unwrap();
        assert_eq!(hex::encode(sui), ED_PUB);
    }

    #[test]
    fn test_sui_address_shape() {
        let addr = address_from_public_key(ED_PUB, Chain::Sui).unwrap();
        assert_eq!(addr.len(), 66);
        assert!(addr.starts_with("0x"));
    }

    #[test]
    fn test_polkadot_address_roundtrip_checksum() {
        let addr = address_from_public_key(ED_PUB, Chain::Polkadot).unwrap();
        let decoded = bs58::decode(&addr).into_vec().unwrap();
        assert_eq!(decoded.len(), 35);
        assert_eq!(decoded[0], 0x00);
        assert_eq!(&decoded[1..33], &decode_ed25519(ED_PUB).unwrap());
    }

    #[test]
    fn test_ton_address_crc() {
        let addr = address_from_public_key(ED_PUB, Chain::Ton).unwrap();
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;
        let raw = URL_SAFE_NO_PAD.decode(addr).unwrap();
        assert_eq!(raw.len(), 36);
        let crc = crc16_ccitt(&raw[..34]);
        assert_eq!(&raw[34..], &crc.to_be_bytes());
    }

    #[test]
    fn test_crc16_known_vector() {
        assert_eq!(crc16_ccitt(b"123456789"), 0x31c3);
    }

    #[test]
    fn test_ecdsa_key_rejected_for_eddsa_chain() {
        assert!(matches!(
            eddsa_public_key(GEN_PUB, Chain::Solana),
            Err(Error::InvalidPublicKey(_))
        ));
        assert!(matches!(
            eddsa_public_key(ED_PUB, Chain::Ethereum),
            Err(Error::UnsupportedChain(_))
        ));
    }

    #[test]
    fn test_derive_address_deterministic() {
        let a = derive_address(GEN_PUB, CHAIN_CODE, Chain::Bitcoin).unwrap();
        let b = derive_address(GEN_PUB, CHAIN_CODE, Chain::Bitcoin).unwrap();
        assert_eq!(a, b);
    }
}
