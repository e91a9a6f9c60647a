// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use ethereum_types::{Address, H256, U256};
use num_rational::BigRational;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::client::StorageBackend;
use crate::config::{ClientConfig, DEFAULT_DISCOVERY_LIMIT};
use crate::proofs::common::{
    bundle::StorageProofBundle,
    error::{ProofError, ProofResult},
    evm::{h256_to_u256, trim_left_zeroes},
};
use crate::proofs::minime::checkpoint::{Checkpoint, CheckpointRead};
use crate::proofs::minime::utils::{array_length_slot, entry_slot};
use crate::proofs::minime::verifier;
use crate::proofs::token::{balance_to_rat, TokenMetadata};
use crate::types::{BlockSelector, StorageResult};

/// Why a discovery candidate was passed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Length word is zero
    EmptyArray,
    /// Length word is too large to be an array length
    NotAnArray(String),
    /// The newest entry could not be read or decoded
    Unreadable(String),
    /// The newest entry has block number zero
    UnsetCheckpoint,
    /// The newest entry does not carry the current balance
    BalanceMismatch,
}

/// Result of evaluating one candidate mapping slot during discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateOutcome {
    Match(BigRational),
    Skip(SkipReason),
}

/// Mapping slot holding a holder's checkpoints, with the balance that matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredSlot {
    pub slot_index: u64,
    #[serde(serialize_with = "serialize_rational")]
    pub balance: BigRational,
}

fn serialize_rational<S: serde::Serializer>(v: &BigRational, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.to_string())
}

/// Locates MiniMe checkpoint arrays and selects the storage keys proving a
/// historical balance.
///
/// A MiniMe token stores every balance a holder has had. A balance at block `B`
/// is proven with two keys: the newest checkpoint at or before `B` and the following
/// array slot, which at `B` is still empty (proof of nil).
///
/// Checkpoints `[100]`, block 105: checkpoint 100 and the empty slot after it.
/// Checkpoints `[70, 80, 90, 100]`, block 87: checkpoint 80 and the slot that
/// later receives 90.
pub struct CheckpointEngine<B: ?Sized> {
    token: TokenMetadata<B>,
    discovery_limit: usize,
}

impl<B: ?Sized> Clone for CheckpointEngine<B> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            discovery_limit: self.discovery_limit,
        }
    }
}

impl<B: StorageBackend + ?Sized> CheckpointEngine<B> {
    pub fn new(token: TokenMetadata<B>) -> Self {
        Self {
            token,
            discovery_limit: DEFAULT_DISCOVERY_LIMIT,
        }
    }

    pub fn from_config(backend: Arc<B>, token: Address, config: &ClientConfig) -> Self {
        Self::new(TokenMetadata::new(backend, token)).with_discovery_limit(config.discovery_limit)
    }

    pub fn with_discovery_limit(mut self, limit: usize) -> Self {
        self.discovery_limit = limit;
        self
    }

    pub fn token(&self) -> &TokenMetadata<B> {
        &self.token
    }

    pub fn discovery_limit(&self) -> usize {
        self.discovery_limit
    }

    /// Length of the holder's checkpoint array at `slot_index`, read at the latest block
    pub async fn read_checkpoint_count(
        &self,
        holder: Address,
        slot_index: u64,
        cancel: &CancellationToken,
    ) -> ProofResult<u64> {
        let word = self
            .token
            .storage_at(
                array_length_slot(holder, slot_index),
                BlockSelector::Latest,
                cancel,
            )
            .await?;
        if trim_left_zeroes(word.as_bytes()).len() > 8 {
            return Err(ProofError::malformed(format!(
                "array length {} at map slot {slot_index} exceeds 64 bits",
                h256_to_u256(&word)
            )));
        }
        Ok(h256_to_u256(&word).as_u64())
    }

    async fn read_entry(
        &self,
        holder: Address,
        slot_index: u64,
        position: u64,
        block: BlockSelector,
        cancel: &CancellationToken,
    ) -> ProofResult<(H256, Checkpoint)> {
        let key = entry_slot(holder, slot_index, position);
        let word = self.token.storage_at(key, block, cancel).await?;
        Ok((key, Checkpoint::decode(&word)?))
    }

    /// Checkpoint at `position` (1-based) of the holder's array, as stored at `block`
    pub async fn read_checkpoint(
        &self,
        holder: Address,
        slot_index: u64,
        position: u64,
        block: BlockSelector,
        cancel: &CancellationToken,
    ) -> ProofResult<CheckpointRead> {
        let decimals = self
            .token
            .token_decimals(cancel)
            .await
            .map_err(|e| ProofError::metadata("decimals", e))?;
        let (key, checkpoint) = self
            .read_entry(holder, slot_index, position, block, cancel)
            .await?;
        Ok(CheckpointRead {
            position,
            key,
            balance: checkpoint.balance(decimals),
            checkpoint,
        })
    }

    /// Decide whether `candidate` holds the holder's checkpoints.
    ///
    /// Remote failures reading the length are fatal. A failure reading the newest entry
    /// only skips the candidate, except for cancellation.
    pub async fn evaluate_candidate(
        &self,
        holder: Address,
        candidate: u64,
        oracle: &BigRational,
        decimals: u8,
        cancel: &CancellationToken,
    ) -> ProofResult<CandidateOutcome> {
        let count = match self.read_checkpoint_count(holder, candidate, cancel).await {
            Ok(0) => return Ok(CandidateOutcome::Skip(SkipReason::EmptyArray)),
            Ok(count) => count,
            Err(ProofError::MalformedCheckpoint { reason }) => {
                return Ok(CandidateOutcome::Skip(SkipReason::NotAnArray(reason)))
            }
            Err(e) => return Err(e),
        };

        let checkpoint = match self
            .read_entry(holder, candidate, count, BlockSelector::Latest, cancel)
            .await
        {
            Ok((_, checkpoint)) => checkpoint,
            Err(ProofError::Cancelled) => return Err(ProofError::Cancelled),
            Err(e) => {
                // lenient: a broken read looks the same as a foreign slot
                tracing::warn!(
                    "skipping map slot {candidate} for {holder:?}: cannot read checkpoint {count}: {e}"
                );
                return Ok(CandidateOutcome::Skip(SkipReason::Unreadable(e.to_string())));
            }
        };

        if checkpoint.block == 0 {
            return Ok(CandidateOutcome::Skip(SkipReason::UnsetCheckpoint));
        }

        let balance = checkpoint.balance(decimals);
        if balance == *oracle {
            Ok(CandidateOutcome::Match(balance))
        } else {
            Ok(CandidateOutcome::Skip(SkipReason::BalanceMismatch))
        }
    }

    /// Find the mapping slot index of the checkpoint balances.
    ///
    /// The newest checkpoint always carries the current balance, so candidates are
    /// tried in increasing order until one matches `balanceOf(holder)`.
    pub async fn discover_slot(
        &self,
        holder: Address,
        cancel: &CancellationToken,
    ) -> ProofResult<DiscoveredSlot> {
        let decimals = self
            .token
            .token_decimals(cancel)
            .await
            .map_err(|e| ProofError::metadata("decimals", e))?;
        let oracle = balance_to_rat(self.token.raw_balance(holder, cancel).await?, decimals);

        for candidate in 0..self.discovery_limit as u64 {
            match self
                .evaluate_candidate(holder, candidate, &oracle, decimals, cancel)
                .await?
            {
                CandidateOutcome::Match(balance) => {
                    tracing::info!("found checkpoint map slot {candidate} for {holder:?}");
                    return Ok(DiscoveredSlot {
                        slot_index: candidate,
                        balance,
                    });
                }
                CandidateOutcome::Skip(reason) => {
                    tracing::debug!("map slot {candidate} skipped: {reason:?}");
                }
            }
        }

        Err(ProofError::SlotNotFound {
            holder,
            limit: self.discovery_limit,
        })
    }

    fn ensure_nil(holder: Address, position: u64, checkpoint: &Checkpoint) -> ProofResult<()> {
        if checkpoint.raw_balance != 0 {
            return Err(ProofError::invariant(
                holder,
                position,
                "proof of nil has a nonzero balance",
            ));
        }
        if checkpoint.block != 0 {
            return Err(ProofError::invariant(
                holder,
                position,
                "proof of nil has a nonzero block",
            ));
        }
        Ok(())
    }

    /// Select the two array keys bracketing `target_block`.
    ///
    /// All entries are read as stored at `target_block`, where every set entry has a
    /// block number at or before it. The first key is the newest such entry, the
    /// second key the empty slot following it.
    pub async fn select_keys(
        &self,
        holder: Address,
        slot_index: u64,
        target_block: u64,
        cancel: &CancellationToken,
    ) -> ProofResult<[H256; 2]> {
        let not_found = || ProofError::CheckpointNotFound {
            holder,
            slot_index,
            target_block,
        };
        let at = BlockSelector::Number(target_block);

        // The array never shrinks, so its latest length bounds every historical one
        let count = self
            .read_checkpoint_count(holder, slot_index, cancel)
            .await?;
        if count == 0 {
            return Err(not_found());
        }

        let (last_key, last) = self
            .read_entry(holder, slot_index, count, at, cancel)
            .await?;
        if last.block != 0 && target_block >= last.block {
            let next = count
                .checked_add(1)
                .ok_or_else(|| ProofError::malformed("array length overflows"))?;
            let (nil_key, nil) = self.read_entry(holder, slot_index, next, at, cancel).await?;
            Self::ensure_nil(holder, next, &nil)?;
            return Ok([last_key, nil_key]);
        }

        // Walk back from the newest checkpoint; exits on the first entry set at target_block
        for position in (1..count).rev() {
            let (key, checkpoint) = self
                .read_entry(holder, slot_index, position, at, cancel)
                .await?;
            if checkpoint.block == 0 || checkpoint.block > target_block {
                continue;
            }
            let (nil_key, nil) = self
                .read_entry(holder, slot_index, position + 1, at, cancel)
                .await?;
            Self::ensure_nil(holder, position + 1, &nil)?;
            return Ok([key, nil_key]);
        }

        Err(not_found())
    }

    /// Build the two-key storage proof of the holder's balance at `target_block`
    pub async fn build_proof(
        &self,
        holder: Address,
        slot_index: u64,
        target_block: u64,
        cancel: &CancellationToken,
    ) -> ProofResult<StorageProofBundle> {
        let keys = self
            .select_keys(holder, slot_index, target_block, cancel)
            .await?;
        tracing::info!(
            "selected checkpoint keys {:?} and {:?} for {holder:?} at block {target_block}",
            keys[0],
            keys[1]
        );
        self.token
            .fetch_storage_proof(&keys, BlockSelector::Number(target_block), cancel)
            .await
    }

    /// Verify a two-key proof against the token's storage root
    pub fn verify(
        &self,
        holder: Address,
        storage_root: H256,
        proofs: &[StorageResult],
        slot_index: u64,
        target_balance: U256,
        target_block: u64,
    ) -> ProofResult<()> {
        verifier::verify_minime_proof(
            holder,
            storage_root,
            proofs,
            slot_index,
            target_balance,
            target_block,
        )
    }

    /// Verify a bundle from [`Self::build_proof`], account proof included
    pub fn verify_bundle(
        &self,
        holder: Address,
        bundle: &StorageProofBundle,
        slot_index: u64,
        target_balance: U256,
        target_block: u64,
    ) -> ProofResult<()> {
        verifier::verify_bundle(
            holder,
            self.token.address(),
            bundle,
            slot_index,
            target_balance,
            target_block,
        )
    }
}
