//! EVM-family transaction compiler (Ethereum, Avalanche C-Chain, BNB Smart
//! Chain, plus ERC-20 transfers).
//!
//! Transactions are always EIP-1559 (type 2). Native transfers carry the
//! optional memo as UTF-8 calldata; token transfers ABI-encode
//! `transfer(address,uint256)` against the coin's contract address. Exactly
//! one preimage hash is produced: keccak256 of `0x02 || rlp(unsigned)`. The
//! signature must carry a recovery id and its `r || s` part is verified
//! against the secp256k1 root key before assembly.

use crate::compiler::{check_family, expect_unsigned, TxCompiler, UnsignedTx};
use crate::keys::keccak256;
use crate::signature::{verified_recoverable_signature, SignatureShares};
use crate::{ChainFamily, ChainSpecificFee, Error, Result, SigningPayload};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rlp::{Encodable, RlpEncodable};

/// `transfer(address,uint256)` selector
const ERC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// EIP-1559 transaction body; RLP order matches the wire format
#[derive(Debug, Clone, RlpEncodable)]
pub struct UnsignedEvmTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub access_list: Vec<AccessListItem>,
}

/// Access list item for EIP-2930
#[derive(Debug, Clone, RlpEncodable)]
pub struct AccessListItem {
    pub address: Address,
    pub storage_keys: Vec<B256>,
}

impl UnsignedEvmTx {
    /// keccak256 of the type byte plus the RLP body
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut encoded = vec![0x02];
        self.encode(&mut encoded);
        keccak256(&encoded)
    }

    /// `0x02 || rlp([body fields, y_parity, r, s])`
    fn encode_signed(&self, signature: &[u8; 65]) -> Vec<u8> {
        let y_parity = signature[64];
        let r = U256::from_be_slice(&signature[..32]);
        let s = U256::from_be_slice(&signature[32..64]);

        let mut stream = alloy_rlp::BytesMut::new();
        alloy_rlp::Header {
            list: true,
            payload_length: self.rlp_payload_length()
                + y_parity.length()
                + r.length()
                + s.length(),
        }
        .encode(&mut stream);

        self.chain_id.encode(&mut stream);
        self.nonce.encode(&mut stream);
        self.max_priority_fee_per_gas.encode(&mut stream);
        self.max_fee_per_gas.encode(&mut stream);
        self.gas_limit.encode(&mut stream);
        self.to.encode(&mut stream);
        self.value.encode(&mut stream);
        self.data.encode(&mut stream);
        self.access_list.encode(&mut stream);
        y_parity.encode(&mut stream);
        r.encode(&mut stream);
        s.encode(&mut stream);

        let mut result = vec![0x02];
        result.extend_from_slice(&stream);
        result
    }

    fn rlp_payload_length(&self) -> usize {
        self.chain_id.length()
            + self.nonce.length()
            + self.max_priority_fee_per_gas.length()
            + self.max_fee_per_gas.length()
            + self.gas_limit.length()
            + self.to.length()
            + self.value.length()
            + self.data.length()
            + self.access_list.length()
    }
}

/// Compiler for all EVM chains
pub struct EvmCompiler;

impl EvmCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EvmCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TxCompiler for EvmCompiler {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn build_unsigned(&self, payload: &SigningPayload) -> Result<UnsignedTx> {
        check_family(payload, ChainFamily::Evm)?;
        let (max_fee_per_gas, priority_fee, nonce, gas_limit) = match payload.fee {
            ChainSpecificFee::Evm {
                max_fee_per_gas,
                priority_fee,
                nonce,
                gas_limit,
            } => (max_fee_per_gas, priority_fee, nonce, gas_limit),
            _ => {
                return Err(Error::InvalidPayload(
                    "EVM payload requires EIP-1559 fee fields".to_string(),
                ))
            }
        };
        let chain_id = payload
            .coin
            .chain
            .evm_chain_id()
            .ok_or_else(|| Error::InvalidPayload("chain has no EVM chain id".to_string()))?;

        let (to, value, data) = match &payload.coin.contract_address {
            Some(contract) => {
                // token transfer: call the contract, value stays zero
                let recipient = parse_address(&payload.to_address)?;
                (
                    parse_address(contract)?,
                    U256::ZERO,
                    Bytes::from(erc20_transfer_data(&recipient, payload.amount)),
                )
            }
            None => {
                let data = payload
                    .memo
                    .as_ref()
                    .map(|m| Bytes::from(m.as_bytes().to_vec()))
                    .unwrap_or_default();
                (
                    parse_address(&payload.to_address)?,
                    U256::from(payload.amount),
                    data,
                )
            }
        };

        Ok(UnsignedTx::Evm(UnsignedEvmTx {
            chain_id,
            nonce,
            max_priority_fee_per_gas: priority_fee,
            max_fee_per_gas,
            gas_limit,
            to,
            value,
            data,
            access_list: Vec::new(),
        }))
    }

    fn preimage_hashes(&self, unsigned: &UnsignedTx) -> Result<Vec<Vec<u8>>> {
        let tx = expect_unsigned!(unsigned, Evm)?;
        Ok(vec![tx.signing_hash().to_vec()])
    }

    fn compile_signed(
        &self,
        unsigned: &UnsignedTx,
        shares: &SignatureShares,
        public_key: &[u8],
    ) -> Result<String> {
        let tx = expect_unsigned!(unsigned, Evm)?;
        let preimage = tx.signing_hash();
        let sig = verified_recoverable_signature(&preimage, shares, public_key)?;
        let sig: [u8; 65] = sig
            .try_into()
            .map_err(|_| Error::InvalidSignature("expected 65-byte signature".to_string()))?;
        Ok(hex::encode(tx.encode_signed(&sig)))
    }
}

fn parse_address(address: &str) -> Result<Address> {
    let stripped = address.strip_prefix("0x").unwrap_or(address);
    let bytes = hex::decode(stripped)
        .map_err(|e| Error::InvalidPayload(format!("bad EVM address: {e}")))?;
    if bytes.len() != 20 {
        return Err(Error::InvalidPayload(format!(
            "EVM address must be 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

/// ABI-encoded `transfer(address,uint256)` calldata
fn erc20_transfer_data(recipient: &Address, amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 + 32);
    data.extend_from_slice(&ERC20_TRANSFER_SELECTOR);
    data.extend_from_slice(&[0u8; 12]);
    data.extend_from_slice(recipient.as_slice());
    data.extend_from_slice(&U256::from(amount).to_be_bytes::<32>());
    data
}
