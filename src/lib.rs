// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

pub mod client;
pub mod config;
pub mod proofs;
pub mod types;

// Re-export main API
pub use client::{EthRpcClient, StorageBackend};
pub use config::ClientConfig;
pub use proofs::minime::{
    entry_slot, mapping_base_slot, parse_minime_value, verify_bundle, verify_minime_proof,
    CandidateOutcome, Checkpoint, CheckpointEngine, DiscoveredSlot,
};
pub use proofs::token::{TokenData, TokenMetadata};
pub use proofs::{ProofError, ProofResult, StorageProofBundle};
pub use types::{BlockHeader, BlockSelector, EthProof, StorageResult};
