// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

//! In-memory archive node for the integration tests.
//!
//! Storage is kept as a per-slot history so reads at a past block see the state of that
//! block. Proofs are generated from real Merkle-Patricia tries built over the state.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use ethereum_types::{Address, H256, U256, U64};
use minime_proofs::proofs::common::abi;
use minime_proofs::proofs::common::evm::{keccak256, left_pad_32};
use minime_proofs::proofs::minime::{array_length_slot, entry_slot};
use minime_proofs::proofs::trie::empty_trie_root;
use minime_proofs::types::Bytes;
use minime_proofs::{BlockHeader, BlockSelector, Checkpoint, EthProof, StorageBackend, StorageResult};
use rlp::RlpStream;

// =============================================================================
// Trie builder
// =============================================================================

enum Node {
    Leaf(Vec<u8>, Vec<u8>),
    Extension(Vec<u8>, Box<Node>),
    Branch(Vec<Option<Node>>),
}

fn nibbles(bytes: &[u8]) -> Vec<u8> {
    bytes.iter().flat_map(|b| [b >> 4, b & 0x0f]).collect()
}

fn hex_prefix(nibbles: &[u8], leaf: bool) -> Vec<u8> {
    let flag = if leaf { 2u8 } else { 0u8 };
    let mut out = Vec::new();
    let rest = if nibbles.len() % 2 == 1 {
        out.push(((flag | 1) << 4) | nibbles[0]);
        &nibbles[1..]
    } else {
        out.push(flag << 4);
        nibbles
    };
    for pair in rest.chunks(2) {
        out.push((pair[0] << 4) | pair[1]);
    }
    out
}

/// Items must be non-empty, share the same path length and have distinct paths
fn build(items: &[(Vec<u8>, Vec<u8>)]) -> Node {
    if let [(path, value)] = items {
        return Node::Leaf(path.clone(), value.clone());
    }

    let first = &items[0].0;
    let common = items.iter().fold(first.len(), |n, (path, _)| {
        first
            .iter()
            .zip(path)
            .take(n)
            .take_while(|(a, b)| a == b)
            .count()
    });
    if common > 0 {
        let stripped: Vec<_> = items
            .iter()
            .map(|(p, v)| (p[common..].to_vec(), v.clone()))
            .collect();
        return Node::Extension(first[..common].to_vec(), Box::new(build(&stripped)));
    }

    let children = (0..16u8)
        .map(|nibble| {
            let group: Vec<_> = items
                .iter()
                .filter(|(p, _)| p[0] == nibble)
                .map(|(p, v)| (p[1..].to_vec(), v.clone()))
                .collect();
            (!group.is_empty()).then(|| build(&group))
        })
        .collect();
    Node::Branch(children)
}

fn append_child(s: &mut RlpStream, child: &Node) {
    let encoded = encode(child);
    if encoded.len() < 32 {
        s.append_raw(&encoded, 1);
    } else {
        s.append(&keccak256(&encoded).to_vec());
    }
}

fn encode(node: &Node) -> Vec<u8> {
    match node {
        Node::Leaf(path, value) => {
            let mut s = RlpStream::new_list(2);
            s.append(&hex_prefix(path, true)).append(value);
            s.out().to_vec()
        }
        Node::Extension(path, child) => {
            let mut s = RlpStream::new_list(2);
            s.append(&hex_prefix(path, false));
            append_child(&mut s, child);
            s.out().to_vec()
        }
        Node::Branch(children) => {
            let mut s = RlpStream::new_list(17);
            for child in children {
                match child {
                    Some(child) => append_child(&mut s, child),
                    None => {
                        s.append_empty_data();
                    }
                }
            }
            s.append_empty_data();
            s.out().to_vec()
        }
    }
}

/// A Merkle-Patricia trie keyed by `keccak256(key)`
pub struct Trie {
    root: Option<Node>,
}

impl Trie {
    pub fn new(entries: impl IntoIterator<Item = (Vec<u8>, Vec<u8>)>) -> Self {
        let mut items: Vec<_> = entries
            .into_iter()
            .map(|(key, value)| (nibbles(&keccak256(key)), value))
            .collect();
        items.sort();
        let root = (!items.is_empty()).then(|| build(&items));
        Self { root }
    }

    pub fn root(&self) -> H256 {
        match &self.root {
            Some(node) => H256(keccak256(encode(node))),
            None => empty_trie_root(),
        }
    }

    /// Nodes from the root towards `key`, inclusion or exclusion alike
    pub fn prove(&self, key: &[u8]) -> Vec<Bytes> {
        let Some(mut node) = self.root.as_ref() else {
            return vec![];
        };
        let path = nibbles(&keccak256(key));
        let mut rest: &[u8] = &path;
        let mut out = Vec::new();
        loop {
            let encoded = encode(node);
            if out.is_empty() || encoded.len() >= 32 {
                out.push(Bytes(encoded));
            }
            match node {
                Node::Leaf(..) => break,
                Node::Extension(partial, child) => {
                    if !rest.starts_with(partial) {
                        break;
                    }
                    rest = &rest[partial.len()..];
                    node = child.as_ref();
                }
                Node::Branch(children) => match &children[rest[0] as usize] {
                    Some(child) => {
                        rest = &rest[1..];
                        node = child;
                    }
                    None => break,
                },
            }
        }
        out
    }
}

// =============================================================================
// ABI responses
// =============================================================================

pub fn abi_uint(v: impl Into<U256>) -> Vec<u8> {
    let mut out = [0u8; 32];
    v.into().to_big_endian(&mut out);
    out.to_vec()
}

pub fn abi_string(s: &str) -> Vec<u8> {
    let mut out = abi_uint(0x20u64);
    out.extend(abi_uint(s.len() as u64));
    let mut body = s.as_bytes().to_vec();
    body.resize(s.len().div_ceil(32) * 32, 0);
    out.extend(body);
    out
}

pub fn abi_bytes32(s: &str) -> Vec<u8> {
    let mut out = s.as_bytes().to_vec();
    out.resize(32, 0);
    out
}

// =============================================================================
// Mock node
// =============================================================================

pub fn token_address() -> Address {
    Address::from_low_u64_be(0x70ce_0000)
}

pub fn holder() -> Address {
    Address::repeat_byte(0x11)
}

const ACCOUNT_NONCE: u64 = 1;

/// Archive node serving a single MiniMe token contract
pub struct MockNode {
    pub token: Address,
    head: u64,
    storage: HashMap<H256, Vec<(u64, H256)>>,
    calls: HashMap<Vec<u8>, Vec<u8>>,
    failing_keys: HashSet<H256>,
    stall_storage: bool,
    storage_reads: AtomicUsize,
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

impl MockNode {
    /// A token with 18 decimals and a regular name and symbol
    pub fn new() -> Self {
        let mut node = Self {
            token: token_address(),
            head: 1,
            storage: HashMap::new(),
            calls: HashMap::new(),
            failing_keys: HashSet::new(),
            stall_storage: false,
            storage_reads: AtomicUsize::new(0),
        };
        node.set_call("name()", abi_string("Aragon Network Token"));
        node.set_call("symbol()", abi_string("ANT"));
        node.set_call("decimals()", abi_uint(18u64));
        node.set_call("totalSupply()", abi_uint(39_609_523u64));
        node
    }

    pub fn set_call(&mut self, signature: &str, response: Vec<u8>) {
        self.calls.insert(abi::encode_call(signature), response);
    }

    /// Make a getter revert
    pub fn revert_call(&mut self, signature: &str) {
        self.calls.remove(&abi::encode_call(signature));
    }

    pub fn set_balance(&mut self, holder: Address, raw: u128) {
        self.calls.insert(
            abi::encode_address_call("balanceOf(address)", holder),
            abi_uint(raw),
        );
    }

    /// Record a storage write taking effect at `block`
    pub fn write(&mut self, key: H256, block: u64, word: H256) {
        let history = self.storage.entry(key).or_default();
        history.push((block, word));
        history.sort_by_key(|(b, _)| *b);
        self.head = self.head.max(block);
    }

    /// Append checkpoints to the holder's array at `slot_index` the way the contract
    /// does: entry and length are written in the checkpoint's own block. The current
    /// balance follows the newest checkpoint.
    pub fn plant(&mut self, holder: Address, slot_index: u64, checkpoints: &[(u128, u64)]) {
        let mut count = self.count_at(holder, slot_index, u64::MAX);
        for &(raw_balance, block) in checkpoints {
            count += 1;
            self.write(
                entry_slot(holder, slot_index, count),
                block,
                Checkpoint::new(raw_balance, block).encode(),
            );
            self.write(
                array_length_slot(holder, slot_index),
                block,
                H256(left_pad_32(&count.to_be_bytes())),
            );
            self.set_balance(holder, raw_balance);
        }
    }

    pub fn fail_key(&mut self, key: H256) {
        self.failing_keys.insert(key);
    }

    /// Storage reads never complete
    pub fn stall_storage(&mut self) {
        self.stall_storage = true;
    }

    /// Advance the chain head without touching storage
    pub fn mine_to(&mut self, block: u64) {
        self.head = self.head.max(block);
    }

    pub fn head(&self) -> u64 {
        self.head
    }

    pub fn storage_reads(&self) -> usize {
        self.storage_reads.load(Ordering::Relaxed)
    }

    fn resolve(&self, block: BlockSelector) -> u64 {
        match block {
            BlockSelector::Latest => self.head,
            BlockSelector::Number(n) => n,
        }
    }

    fn word_at(&self, key: &H256, block: u64) -> H256 {
        self.storage
            .get(key)
            .and_then(|history| history.iter().rev().find(|(b, _)| *b <= block))
            .map(|(_, word)| *word)
            .unwrap_or_default()
    }

    fn count_at(&self, holder: Address, slot_index: u64, block: u64) -> u64 {
        let word = self.word_at(&array_length_slot(holder, slot_index), block);
        U256::from_big_endian(word.as_bytes()).low_u64()
    }

    fn storage_trie(&self, block: u64) -> Trie {
        Trie::new(self.storage.keys().filter_map(|key| {
            let value = U256::from_big_endian(self.word_at(key, block).as_bytes());
            (!value.is_zero()).then(|| (key.as_bytes().to_vec(), rlp::encode(&value).to_vec()))
        }))
    }

    fn code_hash() -> H256 {
        H256(keccak256(b"minime"))
    }

    fn account_rlp(storage_hash: H256) -> Vec<u8> {
        let mut s = RlpStream::new_list(4);
        s.append(&ACCOUNT_NONCE)
            .append(&U256::zero())
            .append(&storage_hash)
            .append(&Self::code_hash());
        s.out().to_vec()
    }

    fn state_trie(&self, storage_hash: H256) -> Trie {
        let filler = Address::repeat_byte(0xee);
        let mut filler_account = RlpStream::new_list(4);
        filler_account
            .append(&0u64)
            .append(&U256::from(1_000u64))
            .append(&empty_trie_root())
            .append(&H256(keccak256(b"")));
        Trie::new([
            (
                self.token.as_bytes().to_vec(),
                Self::account_rlp(storage_hash),
            ),
            (filler.as_bytes().to_vec(), filler_account.out().to_vec()),
        ])
    }

    fn check_block(&self, block: u64) -> Result<()> {
        if block > self.head {
            bail!("header not found");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MockNode {
    async fn storage_at(&self, contract: Address, key: H256, block: BlockSelector) -> Result<H256> {
        if self.stall_storage {
            std::future::pending::<()>().await;
        }
        self.storage_reads.fetch_add(1, Ordering::Relaxed);
        if contract != self.token {
            return Ok(H256::zero());
        }
        if self.failing_keys.contains(&key) {
            bail!("connection reset reading {key:?}");
        }
        let block = self.resolve(block);
        self.check_block(block)?;
        Ok(self.word_at(&key, block))
    }

    async fn block_header(&self, block: BlockSelector) -> Result<BlockHeader> {
        let number = self.resolve(block);
        self.check_block(number)?;
        let storage_hash = self.storage_trie(number).root();
        Ok(BlockHeader {
            number: U64::from(number),
            hash: Some(H256(keccak256(number.to_be_bytes()))),
            state_root: self.state_trie(storage_hash).root(),
        })
    }

    async fn storage_proof(
        &self,
        contract: Address,
        keys: &[H256],
        block: BlockSelector,
    ) -> Result<EthProof> {
        if contract != self.token {
            bail!("no contract at {contract:?}");
        }
        let number = self.resolve(block);
        self.check_block(number)?;
        let storage = self.storage_trie(number);
        let storage_hash = storage.root();
        let state = self.state_trie(storage_hash);

        Ok(EthProof {
            address: self.token,
            balance: U256::zero(),
            code_hash: Self::code_hash(),
            nonce: U64::from(ACCOUNT_NONCE),
            storage_hash,
            account_proof: state.prove(self.token.as_bytes()),
            storage_proof: keys
                .iter()
                .map(|key| StorageResult {
                    key: *key,
                    value: U256::from_big_endian(self.word_at(key, number).as_bytes()),
                    proof: storage.prove(key.as_bytes()),
                })
                .collect(),
        })
    }

    async fn call(&self, contract: Address, data: Vec<u8>, _block: BlockSelector) -> Result<Vec<u8>> {
        if contract != self.token {
            return Ok(vec![]);
        }
        self.calls
            .get(&data)
            .cloned()
            .ok_or_else(|| anyhow!("execution reverted"))
    }
}
