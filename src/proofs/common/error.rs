// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::Address;
use thiserror::Error;

use crate::proofs::common::abi::AbiError;
use crate::proofs::trie::TrieError;

/// Main error type for proof generation and verification
#[derive(Error, Debug)]
pub enum ProofError {
    /// Storage, contract call or RPC failure reported by the backend
    #[error("remote read failed ({context}): {source:#}")]
    RemoteRead {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// Discovery exhausted its candidates without a balance match
    #[error("storage slot not found for holder {holder:?} within {limit} candidates")]
    SlotNotFound { holder: Address, limit: usize },

    /// No checkpoint brackets the requested block
    #[error(
        "checkpoint not found for holder {holder:?} at map slot {slot_index} and block {target_block}"
    )]
    CheckpointNotFound {
        holder: Address,
        slot_index: u64,
        target_block: u64,
    },

    /// A position that must be empty decoded as a real checkpoint
    #[error("invariant violated for holder {holder:?} at position {position}: {reason}")]
    InvariantViolation {
        holder: Address,
        position: u64,
        reason: String,
    },

    /// Token data needed for scaled arithmetic could not be read
    #[error("token {field} unavailable: {source}")]
    MetadataUnavailable {
        field: &'static str,
        #[source]
        source: Box<ProofError>,
    },

    /// A storage word that does not follow the checkpoint layout
    #[error("malformed checkpoint: {reason}")]
    MalformedCheckpoint { reason: String },

    /// Contract call result could not be decoded
    #[error(transparent)]
    Abi(#[from] AbiError),

    /// Merkle-Patricia proof did not verify
    #[error(transparent)]
    Trie(#[from] TrieError),

    /// Invalid proof structure or data
    #[error("invalid proof: {reason}")]
    InvalidProof { reason: String },

    /// Verification failed with details
    #[error("verification failed: {details}")]
    VerificationFailed { details: String },

    /// The caller cancelled the operation
    #[error("operation cancelled")]
    Cancelled,

    /// Generic errors from other sources
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProofError {
    /// Create a remote read error
    pub fn remote(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::RemoteRead {
            context: context.into(),
            source,
        }
    }

    /// Wrap a failure to read a token field, keeping cancellation as is
    pub fn metadata(field: &'static str, source: ProofError) -> Self {
        match source {
            Self::Cancelled => Self::Cancelled,
            other => Self::MetadataUnavailable {
                field,
                source: Box::new(other),
            },
        }
    }

    /// Create an invariant violation error
    pub fn invariant(holder: Address, position: u64, reason: impl Into<String>) -> Self {
        Self::InvariantViolation {
            holder,
            position,
            reason: reason.into(),
        }
    }

    /// Create a malformed checkpoint error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedCheckpoint {
            reason: reason.into(),
        }
    }

    /// Create an invalid proof error
    pub fn invalid_proof(reason: impl Into<String>) -> Self {
        Self::InvalidProof {
            reason: reason.into(),
        }
    }

    /// Create a verification failed error
    pub fn verification_failed(details: impl Into<String>) -> Self {
        Self::VerificationFailed {
            details: details.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Result type alias using ProofError
pub type ProofResult<T> = Result<T, ProofError>;
