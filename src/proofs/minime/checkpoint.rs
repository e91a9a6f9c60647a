// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::{H256, U256};
use num_rational::BigRational;

use crate::proofs::common::error::{ProofError, ProofResult};
use crate::proofs::common::evm::u256_to_h256;
use crate::proofs::token::balance_to_rat;

/// A MiniMe checkpoint as packed in storage.
///
/// The contract declares `struct Checkpoint { uint128 fromBlock; uint128 value; }`, so the
/// block number sits in the low 16 bytes of the word and the balance in the high 16.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub raw_balance: u128,
    pub block: u64,
}

impl Checkpoint {
    /// Unset array slot
    pub const EMPTY: Checkpoint = Checkpoint {
        raw_balance: 0,
        block: 0,
    };

    pub fn new(raw_balance: u128, block: u64) -> Self {
        Self { raw_balance, block }
    }

    /// Unpack a storage word
    pub fn decode(word: &H256) -> ProofResult<Self> {
        let bytes = word.as_bytes();
        let mut balance = [0u8; 16];
        balance.copy_from_slice(&bytes[..16]);
        let mut block = [0u8; 16];
        block.copy_from_slice(&bytes[16..]);
        let block = u128::from_be_bytes(block);
        let block = u64::try_from(block)
            .map_err(|_| ProofError::malformed(format!("block number {block} exceeds 64 bits")))?;
        Ok(Self {
            raw_balance: u128::from_be_bytes(balance),
            block,
        })
    }

    /// Unpack a proven storage value
    pub fn decode_value(value: U256) -> ProofResult<Self> {
        Self::decode(&u256_to_h256(value))
    }

    /// Pack into a storage word
    pub fn encode(&self) -> H256 {
        let mut out = [0u8; 32];
        out[..16].copy_from_slice(&self.raw_balance.to_be_bytes());
        out[16..].copy_from_slice(&u128::from(self.block).to_be_bytes());
        H256(out)
    }

    /// Proof-of-nil sentinel: zero balance and zero block
    pub fn is_empty(&self) -> bool {
        self.raw_balance == 0 && self.block == 0
    }

    /// Balance scaled by the token decimals
    pub fn balance(&self, decimals: u8) -> BigRational {
        balance_to_rat(U256::from(self.raw_balance), decimals)
    }
}

/// Decode a checkpoint word into its scaled balance and block number
pub fn parse_minime_value(word: &H256, decimals: u8) -> ProofResult<(BigRational, u64)> {
    let checkpoint = Checkpoint::decode(word)?;
    Ok((checkpoint.balance(decimals), checkpoint.block))
}

/// A checkpoint read from a specific array position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRead {
    pub position: u64,
    pub key: H256,
    pub checkpoint: Checkpoint,
    pub balance: BigRational,
}
