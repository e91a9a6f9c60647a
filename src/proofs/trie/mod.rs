// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

//! Merkle-Patricia trie proof verification for EIP-1186 account and storage proofs.
//!
//! Paths are the keccak256 of the account address or storage key. Values are stored
//! RLP-encoded; zero storage values are not stored at all and are proven by exclusion.

use ethereum_types::H256;
use rlp::{Rlp, RlpStream};
use thiserror::Error;

use crate::proofs::common::evm::keccak256;
use crate::types::{Bytes, EthProof, StorageResult};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    #[error("proof node {index} hash mismatch: expected {expected:?}, got {got:?}")]
    HashMismatch {
        index: usize,
        expected: H256,
        got: H256,
    },

    #[error("proof ended before the path was resolved")]
    IncompleteProof,

    #[error("invalid trie node: {0}")]
    InvalidNode(String),

    #[error("rlp decode error: {0}")]
    Rlp(#[from] rlp::DecoderError),

    #[error("value mismatch: expected {expected}, got {got}")]
    ValueMismatch { expected: String, got: String },

    #[error("path is absent from the trie but a value was expected")]
    UnexpectedExclusion,
}

/// Root of a trie without entries, `keccak256(rlp(""))`
pub fn empty_trie_root() -> H256 {
    H256(keccak256(rlp::NULL_RLP))
}

enum NodeRef<'a> {
    Hash(H256),
    Inline(&'a [u8]),
}

fn to_nibbles(path: &[u8]) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(path.len() * 2);
    for b in path {
        nibbles.push(b >> 4);
        nibbles.push(b & 0x0f);
    }
    nibbles
}

/// Decode a hex-prefix encoded partial path, returning its nibbles and the leaf flag
fn decode_hex_prefix(encoded: &[u8]) -> Result<(Vec<u8>, bool), TrieError> {
    let first = *encoded
        .first()
        .ok_or_else(|| TrieError::InvalidNode("empty partial path".to_string()))?;
    let flag = first >> 4;
    if flag > 3 {
        return Err(TrieError::InvalidNode(format!("bad hex-prefix flag {flag}")));
    }
    let is_leaf = flag & 0x2 != 0;
    let mut nibbles = Vec::with_capacity(encoded.len() * 2);
    if flag & 0x1 != 0 {
        nibbles.push(first & 0x0f);
    }
    nibbles.extend(to_nibbles(&encoded[1..]));
    Ok((nibbles, is_leaf))
}

fn child_ref<'a>(child: Rlp<'a>) -> Result<Option<NodeRef<'a>>, TrieError> {
    if child.is_list() {
        return Ok(Some(NodeRef::Inline(child.as_raw())));
    }
    let data = child.data()?;
    match data.len() {
        0 => Ok(None),
        32 => Ok(Some(NodeRef::Hash(H256::from_slice(data)))),
        n => Err(TrieError::InvalidNode(format!("child reference of {n} bytes"))),
    }
}

/// Walk `proof` from `root` along `path`; `None` means the path is proven absent
fn lookup<'a>(root: H256, path: &[u8], proof: &'a [Bytes]) -> Result<Option<&'a [u8]>, TrieError> {
    if proof.is_empty() && root == empty_trie_root() {
        return Ok(None);
    }

    let nibbles = to_nibbles(path);
    let mut rest: &[u8] = &nibbles;
    let mut next = NodeRef::Hash(root);
    let mut nodes = proof.iter().enumerate();

    loop {
        let raw: &'a [u8] = match next {
            NodeRef::Hash(expected) => {
                let (index, node) = nodes.next().ok_or(TrieError::IncompleteProof)?;
                let got = H256(keccak256(node));
                if got != expected {
                    return Err(TrieError::HashMismatch {
                        index,
                        expected,
                        got,
                    });
                }
                node.as_ref()
            }
            NodeRef::Inline(raw) => raw,
        };

        let node = Rlp::new(raw);
        match node.item_count()? {
            17 => {
                let Some((&nibble, tail)) = rest.split_first() else {
                    let value = node.at(16)?.data()?;
                    return Ok((!value.is_empty()).then_some(value));
                };
                rest = tail;
                match child_ref(node.at(nibble as usize)?)? {
                    Some(child) => next = child,
                    None => return Ok(None),
                }
            }
            2 => {
                let (partial, is_leaf) = decode_hex_prefix(node.at(0)?.data()?)?;
                if is_leaf {
                    if partial.as_slice() == rest {
                        return Ok(Some(node.at(1)?.data()?));
                    }
                    return Ok(None);
                }
                if !rest.starts_with(&partial) {
                    return Ok(None);
                }
                rest = &rest[partial.len()..];
                next = child_ref(node.at(1)?)?.ok_or_else(|| {
                    TrieError::InvalidNode("extension node without child".to_string())
                })?;
            }
            n => {
                return Err(TrieError::InvalidNode(format!(
                    "node with {n} items"
                )))
            }
        }
    }
}

/// Verify that `path` maps to `expected` (or is absent when `expected` is `None`) under `root`
pub fn verify_proof(
    root: H256,
    path: &[u8],
    expected: Option<&[u8]>,
    proof: &[Bytes],
) -> Result<(), TrieError> {
    match (lookup(root, path, proof)?, expected) {
        (None, None) => Ok(()),
        (Some(got), Some(want)) if got == want => Ok(()),
        (Some(got), want) => Err(TrieError::ValueMismatch {
            expected: want.map_or_else(|| "absent".to_string(), |w| format!("0x{}", hex::encode(w))),
            got: format!("0x{}", hex::encode(got)),
        }),
        (None, Some(_)) => Err(TrieError::UnexpectedExclusion),
    }
}

/// Verify the account part of an EIP-1186 proof against a state root
pub fn verify_account_proof(state_root: H256, proof: &EthProof) -> Result<(), TrieError> {
    let mut account = RlpStream::new_list(4);
    account
        .append(&proof.nonce.as_u64())
        .append(&proof.balance)
        .append(&proof.storage_hash)
        .append(&proof.code_hash);
    let encoded = account.out();
    verify_proof(
        state_root,
        &keccak256(proof.address),
        Some(encoded.as_ref()),
        &proof.account_proof,
    )
}

/// Verify one storage result against the account's storage root
pub fn verify_storage_proof(storage_root: H256, result: &StorageResult) -> Result<(), TrieError> {
    let path = keccak256(result.key);
    if result.value.is_zero() {
        return verify_proof(storage_root, &path, None, &result.proof);
    }
    let encoded = rlp::encode(&result.value);
    verify_proof(storage_root, &path, Some(encoded.as_ref()), &result.proof)
}
