// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use ethereum_types::{Address, H256, U256};

use crate::proofs::common::evm::{h256_to_u256, keccak256, left_pad_32, u256_to_h256};

/// Compute a Solidity mapping slot using keccak( key(32) || slotIndex(32) )
pub fn compute_mapping_slot(key: [u8; 32], slot_index: u64) -> [u8; 32] {
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(&key);
    let mut slot_be = [0u8; 32];
    slot_be[24..].copy_from_slice(&slot_index.to_be_bytes());
    buf[32..].copy_from_slice(&slot_be);
    keccak256(buf)
}

/// Slot of `mapping[holder]` for the mapping declared at `slot_index`
pub fn mapping_base_slot(holder: Address, slot_index: u64) -> H256 {
    H256(compute_mapping_slot(left_pad_32(holder.as_bytes()), slot_index))
}

/// Slot holding the length of the holder's checkpoint array
pub fn array_length_slot(holder: Address, slot_index: u64) -> H256 {
    mapping_base_slot(holder, slot_index)
}

/// First slot of the array data, `keccak(mapping slot)`
pub fn array_data_slot(holder: Address, slot_index: u64) -> U256 {
    U256::from_big_endian(&keccak256(mapping_base_slot(holder, slot_index)))
}

/// Slot of checkpoint `position` (1-based) in the holder's array.
///
/// Position 0 addresses the word before the array data; the arithmetic wraps modulo 2^256.
pub fn entry_slot(holder: Address, slot_index: u64, position: u64) -> H256 {
    let base = array_data_slot(holder, slot_index);
    let slot = if position == 0 {
        base.overflowing_sub(U256::one()).0
    } else {
        base.overflowing_add(U256::from(position - 1)).0
    };
    u256_to_h256(slot)
}

/// Position of `key` within the holder's array, if the key belongs to it
pub fn entry_position(holder: Address, slot_index: u64, key: &H256) -> Option<u64> {
    let offset = h256_to_u256(key).overflowing_sub(array_data_slot(holder, slot_index)).0;
    if offset >= U256::from(u64::MAX) {
        return None;
    }
    Some(offset.as_u64() + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder() -> Address {
        Address::from_low_u64_be(0xdead_beef)
    }

    #[test]
    fn mapping_slot_matches_manual_preimage() {
        let mut preimage = [0u8; 64];
        preimage[12..32].copy_from_slice(holder().as_bytes());
        preimage[63] = 4;
        assert_eq!(mapping_base_slot(holder(), 4), H256(keccak256(preimage)));
    }

    #[test]
    fn length_lives_at_mapping_slot() {
        assert_eq!(array_length_slot(holder(), 2), mapping_base_slot(holder(), 2));
    }

    #[test]
    fn entries_are_consecutive() {
        let first = entry_slot(holder(), 1, 1);
        assert_eq!(first, H256(keccak256(mapping_base_slot(holder(), 1))));

        let third = h256_to_u256(&entry_slot(holder(), 1, 3));
        assert_eq!(third, h256_to_u256(&first) + U256::from(2));

        let zeroth = h256_to_u256(&entry_slot(holder(), 1, 0));
        assert_eq!(zeroth.overflowing_add(U256::one()).0, h256_to_u256(&first));
    }

    #[test]
    fn slot_index_changes_keys() {
        assert_ne!(entry_slot(holder(), 0, 1), entry_slot(holder(), 1, 1));
        assert_ne!(
            entry_slot(holder(), 0, 1),
            entry_slot(Address::from_low_u64_be(1), 0, 1)
        );
    }

    #[test]
    fn position_recovered_from_key() {
        for position in [1u64, 2, 17, 1_000] {
            let key = entry_slot(holder(), 3, position);
            assert_eq!(entry_position(holder(), 3, &key), Some(position));
        }
        let foreign = entry_slot(Address::from_low_u64_be(7), 3, 1);
        assert_eq!(entry_position(holder(), 3, &foreign), None);
    }
}
