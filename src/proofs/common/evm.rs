// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::{H256, U256};
use sha3::{Digest, Keccak256};

/// General Keccak256 hash function
pub fn keccak256(bytes: impl AsRef<[u8]>) -> [u8; 32] {
    let mut h = Keccak256::new();
    h.update(bytes.as_ref());
    let out = h.finalize();
    let mut r = [0u8; 32];
    r.copy_from_slice(&out);
    r
}

/// Compute the 4-byte selector of a Solidity function signature, e.g. `balanceOf(address)`
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut sel = [0u8; 4];
    sel.copy_from_slice(&hash[..4]);
    sel
}

/// Left-pad bytes to 32 bytes (for EVM storage values)
pub fn left_pad_32(v: &[u8]) -> [u8; 32] {
    if v.len() >= 32 {
        let mut out = [0u8; 32];
        out.copy_from_slice(&v[v.len() - 32..]);
        return out;
    }
    let mut out = [0u8; 32];
    out[32 - v.len()..].copy_from_slice(v);
    out
}

/// Strip leading zero bytes
pub fn trim_left_zeroes(v: &[u8]) -> &[u8] {
    let first = v.iter().position(|b| *b != 0).unwrap_or(v.len());
    &v[first..]
}

/// Interpret a 32-byte word as a big-endian unsigned integer
pub fn h256_to_u256(h: &H256) -> U256 {
    U256::from_big_endian(h.as_bytes())
}

/// Encode an unsigned integer as a 32-byte big-endian word
pub fn u256_to_h256(v: U256) -> H256 {
    let mut out = [0u8; 32];
    v.to_big_endian(&mut out);
    H256(out)
}
