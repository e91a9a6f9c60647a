// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};

use crate::types::{EthProof, StorageResult};

/// Storage proof of a set of keys anchored to a block's state root
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProofBundle {
    /// State root of the block the proof was generated at
    pub state_root: H256,
    /// Number of that block
    pub height: u64,
    /// Storage keys in request order
    pub keys: Vec<H256>,
    /// Account and storage proofs as returned by the node
    pub proof: EthProof,
}

impl StorageProofBundle {
    /// Storage results in the order of `keys`
    pub fn storage_results(&self) -> &[StorageResult] {
        &self.proof.storage_proof
    }

    /// Proven value of `key`, if it is part of the bundle
    pub fn value_of(&self, key: &H256) -> Option<U256> {
        self.proof
            .storage_proof
            .iter()
            .find(|r| r.key == *key)
            .map(|r| r.value)
    }
}
