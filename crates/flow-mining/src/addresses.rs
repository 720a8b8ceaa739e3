//! Per-group reward addresses.
//!
//! The coinbase of a block on chain `(main, to)` pays an address that
//! belongs to group `to`, so key derivation grinds a counter until the
//! derived key lands in the wanted group. Derivation is deterministic in
//! the seed.

use flow_types::{public_key_to_group, GroupIndex, Hash, SecretKey};

/// A reward key pinned to a group.
pub struct GroupAddress {
    pub group: GroupIndex,
    pub key: SecretKey,
    /// Lock hash the coinbase pays.
    pub lock_hash: Hash,
}

/// Derive one reward address per group from `seed`. The returned vector is
/// indexed by group; every entry satisfies
/// `public_key_to_group(key) == group`.
pub fn derive_group_addresses(seed: [u8; 32], groups: u32) -> Vec<GroupAddress> {
    (0..groups)
        .map(|group| {
            let target = GroupIndex::new(group);
            let mut counter: u64 = 0;
            loop {
                let mut material = Vec::with_capacity(44);
                material.extend_from_slice(&seed);
                material.extend_from_slice(&group.to_be_bytes());
                material.extend_from_slice(&counter.to_be_bytes());
                let key = SecretKey::from_seed(*Hash::hash_blake2b(&material).as_bytes());
                let public = key.public_key();
                if public_key_to_group(&public, groups) == target {
                    return GroupAddress {
                        group: target,
                        key,
                        lock_hash: public.address(),
                    };
                }
                counter += 1;
            }
        })
        .collect()
}
