pub mod common;
pub mod minime;
pub mod token;
pub mod trie;

pub use common::{ProofError, ProofResult, StorageProofBundle};
pub use minime::{CheckpointEngine, DiscoveredSlot};
pub use token::{TokenData, TokenMetadata};
