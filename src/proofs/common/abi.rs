// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

//! Minimal ABI codec for the ERC-20 getters used by the token wrapper.

use ethereum_types::{Address, U256};
use thiserror::Error;

use crate::proofs::common::evm::{function_selector, left_pad_32};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AbiError {
    /// The call returned no data (typically a missing optional getter)
    #[error("cannot decode an empty call result")]
    Empty,

    #[error("call result too short: expected at least {expected} bytes, got {got}")]
    TooShort { expected: usize, got: usize },

    #[error("value does not fit {0}")]
    Overflow(&'static str),

    #[error("string offset {0} out of range")]
    InvalidOffset(U256),

    #[error("string is not valid utf-8")]
    InvalidUtf8,
}

/// Calldata for a getter without arguments
pub fn encode_call(signature: &str) -> Vec<u8> {
    function_selector(signature).to_vec()
}

/// Calldata for a function taking a single address argument
pub fn encode_address_call(signature: &str, address: Address) -> Vec<u8> {
    let mut data = function_selector(signature).to_vec();
    data.extend_from_slice(&left_pad_32(address.as_bytes()));
    data
}

fn word(data: &[u8], at: usize) -> Result<U256, AbiError> {
    if data.is_empty() {
        return Err(AbiError::Empty);
    }
    let end = at + 32;
    if data.len() < end {
        return Err(AbiError::TooShort {
            expected: end,
            got: data.len(),
        });
    }
    Ok(U256::from_big_endian(&data[at..end]))
}

/// Decode a `uint256` return value
pub fn decode_uint256(data: &[u8]) -> Result<U256, AbiError> {
    word(data, 0)
}

/// Decode a `uint8` return value
pub fn decode_uint8(data: &[u8]) -> Result<u8, AbiError> {
    let v = word(data, 0)?;
    if v > U256::from(u8::MAX) {
        return Err(AbiError::Overflow("uint8"));
    }
    Ok(v.low_u32() as u8)
}

/// Decode a `string` return value.
///
/// Some older tokens declare `name()`/`symbol()` as `bytes32`; a result of exactly one
/// word is read that way, with trailing NUL bytes removed.
pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    if data.is_empty() {
        return Err(AbiError::Empty);
    }
    if data.len() == 32 {
        let end = data.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        return String::from_utf8(data[..end].to_vec()).map_err(|_| AbiError::InvalidUtf8);
    }

    let offset = word(data, 0)?;
    if offset > U256::from(data.len()) {
        return Err(AbiError::InvalidOffset(offset));
    }
    let offset = offset.as_usize();
    let len = word(data, offset)?;
    let start = offset + 32;
    if len > U256::from(data.len() - start) {
        return Err(AbiError::TooShort {
            expected: start.saturating_add(len.low_u64() as usize),
            got: data.len(),
        });
    }
    let end = start + len.as_usize();
    String::from_utf8(data[start..end].to_vec()).map_err(|_| AbiError::InvalidUtf8)
}
