// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::fmt;

use ethereum_types::{Address, H256, U256, U64};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::proofs::common::evm::left_pad_32;

/// Block to evaluate a read at
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockSelector {
    #[default]
    Latest,
    Number(u64),
}

impl BlockSelector {
    /// JSON-RPC block parameter: `"latest"` or a `0x` quantity
    pub fn to_rpc_arg(&self) -> String {
        match self {
            Self::Latest => "latest".to_string(),
            Self::Number(n) => format!("0x{n:x}"),
        }
    }
}

impl From<Option<u64>> for BlockSelector {
    fn from(block: Option<u64>) -> Self {
        block.map_or(Self::Latest, Self::Number)
    }
}

impl From<u64> for BlockSelector {
    fn from(block: u64) -> Self {
        Self::Number(block)
    }
}

impl fmt::Display for BlockSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Raw bytes carried as `0x`-prefixed hex on the wire
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(v: Vec<u8>) -> Self {
        Self(v)
    }
}

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(&self.0)))
    }
}

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_hex(&s).map(Bytes).map_err(serde::de::Error::custom)
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, hex::FromHexError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.len() % 2 == 1 {
        hex::decode(format!("0{digits}"))
    } else {
        hex::decode(digits)
    }
}

// Nodes return storage keys either as full 32-byte words or as minimal quantities ("0x0")
fn deserialize_storage_key<'de, D>(deserializer: D) -> Result<H256, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let raw = decode_hex(&s).map_err(serde::de::Error::custom)?;
    if raw.len() > 32 {
        return Err(serde::de::Error::custom(format!(
            "storage key longer than 32 bytes: {s}"
        )));
    }
    Ok(H256(left_pad_32(&raw)))
}

/// Subset of `eth_getBlockByNumber` needed to anchor a proof
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    pub number: U64,
    #[serde(default)]
    pub hash: Option<H256>,
    pub state_root: H256,
}

/// One entry of `eth_getProof`'s `storageProof` list
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct StorageResult {
    #[serde(deserialize_with = "deserialize_storage_key")]
    pub key: H256,
    pub value: U256,
    pub proof: Vec<Bytes>,
}

/// `eth_getProof` response (EIP-1186)
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EthProof {
    pub address: Address,
    pub balance: U256,
    pub code_hash: H256,
    pub nonce: U64,
    pub storage_hash: H256,
    pub account_proof: Vec<Bytes>,
    pub storage_proof: Vec<StorageResult>,
}
