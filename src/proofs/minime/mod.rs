pub mod checkpoint;
pub mod generator;
pub mod utils;
pub mod verifier;

pub use checkpoint::{parse_minime_value, Checkpoint, CheckpointRead};
pub use generator::{CandidateOutcome, CheckpointEngine, DiscoveredSlot, SkipReason};
pub use utils::{array_length_slot, compute_mapping_slot, entry_slot, mapping_base_slot};
pub use verifier::{check_minime_keys, verify_bundle, verify_minime_proof};
