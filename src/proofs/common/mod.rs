pub mod abi;
pub mod bundle;
pub mod cancel;
pub mod error;
pub mod evm;

pub use abi::AbiError;
pub use bundle::StorageProofBundle;
pub use cancel::cancellable;
pub use error::{ProofError, ProofResult};
pub use evm::{function_selector, keccak256, left_pad_32, trim_left_zeroes};
