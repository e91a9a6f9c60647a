// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::{Address, H256, U256};

use crate::proofs::common::{
    bundle::StorageProofBundle,
    error::{ProofError, ProofResult},
};
use crate::proofs::minime::checkpoint::Checkpoint;
use crate::proofs::minime::utils::{entry_position, entry_slot};
use crate::proofs::trie;
use crate::types::StorageResult;

/// Check that both keys are consecutive entries of the holder's checkpoint array.
///
/// Returns the array position of the first key.
pub fn check_minime_keys(
    holder: Address,
    slot_index: u64,
    first: &H256,
    second: &H256,
) -> ProofResult<u64> {
    let position = entry_position(holder, slot_index, first).ok_or_else(|| {
        ProofError::invalid_proof(format!(
            "key {first:?} is not in the checkpoint array of {holder:?} at map slot {slot_index}"
        ))
    })?;
    let next = position
        .checked_add(1)
        .ok_or_else(|| ProofError::invalid_proof("checkpoint position overflows"))?;
    if entry_slot(holder, slot_index, next) != *second {
        return Err(ProofError::invalid_proof(format!(
            "keys {first:?} and {second:?} are not consecutive"
        )));
    }
    Ok(position)
}

/// Verify a MiniMe balance proof against the token's storage root.
///
/// The first proof must hold a checkpoint with `target_balance` recorded at or before
/// `target_block`; the second must be empty or hold a checkpoint after `target_block`.
pub fn verify_minime_proof(
    holder: Address,
    storage_root: H256,
    proofs: &[StorageResult],
    slot_index: u64,
    target_balance: U256,
    target_block: u64,
) -> ProofResult<()> {
    let [current, next] = proofs else {
        return Err(ProofError::invalid_proof(format!(
            "expected 2 storage proofs, got {}",
            proofs.len()
        )));
    };

    let position = check_minime_keys(holder, slot_index, &current.key, &next.key)?;

    for result in proofs {
        trie::verify_storage_proof(storage_root, result)?;
    }

    let checkpoint = Checkpoint::decode_value(current.value)?;
    if checkpoint.block == 0 {
        return Err(ProofError::verification_failed(format!(
            "position {position} holds no checkpoint"
        )));
    }
    if U256::from(checkpoint.raw_balance) != target_balance {
        return Err(ProofError::verification_failed(format!(
            "balance mismatch: proven {}, claimed {target_balance}",
            checkpoint.raw_balance
        )));
    }
    if checkpoint.block > target_block {
        return Err(ProofError::verification_failed(format!(
            "checkpoint block {} is after target block {target_block}",
            checkpoint.block
        )));
    }

    let following = Checkpoint::decode_value(next.value)?;
    if !following.is_empty() && following.block <= target_block {
        return Err(ProofError::verification_failed(format!(
            "next checkpoint block {} does not follow target block {target_block}",
            following.block
        )));
    }

    tracing::debug!(
        "verified balance {target_balance} of {holder:?} at block {target_block} (position {position})"
    );
    Ok(())
}

/// Verify a proof bundle end to end: the token account against the bundle's state
/// root, then the two checkpoint keys against the account's storage root.
pub fn verify_bundle(
    holder: Address,
    token: Address,
    bundle: &StorageProofBundle,
    slot_index: u64,
    target_balance: U256,
    target_block: u64,
) -> ProofResult<()> {
    if bundle.proof.address != token {
        return Err(ProofError::invalid_proof(format!(
            "proof is for account {:?}, expected token {token:?}",
            bundle.proof.address
        )));
    }
    if bundle.height != target_block {
        return Err(ProofError::invalid_proof(format!(
            "proof is anchored at block {}, expected {target_block}",
            bundle.height
        )));
    }
    let proven_keys: Vec<H256> = bundle.storage_results().iter().map(|r| r.key).collect();
    if proven_keys != bundle.keys {
        return Err(ProofError::invalid_proof(
            "storage proofs do not match the requested keys",
        ));
    }

    trie::verify_account_proof(bundle.state_root, &bundle.proof)?;

    verify_minime_proof(
        holder,
        bundle.proof.storage_hash,
        bundle.storage_results(),
        slot_index,
        target_balance,
        target_block,
    )
}
