//! Guardian set snapshots and quorum arithmetic.

use crate::address::Address;
use std::collections::HashMap;

/// Number of signatures required for quorum over `num_guardians`: strictly
/// more than two thirds of the set.
pub fn quorum_count(num_guardians: usize) -> usize {
    num_guardians * 2 / 3 + 1
}

/// An immutable snapshot of the guardian set valid at a point in time.
///
/// Holds the ordered guardian addresses and a reverse index for membership
/// lookups. Consumers capture a snapshot once and keep it for their whole
/// lifetime; set rotation produces a new snapshot with a new set index.
#[derive(Debug, Clone)]
pub struct GuardianSet {
    /// Guardian addresses in canonical order.
    keys: Vec<Address>,
    /// Reverse lookup from address to position in `keys`.
    key_index: HashMap<Address, usize>,
    /// Version number of this set.
    index: u32,
}

impl GuardianSet {
    /// Largest supported guardian set. Signature indices are a single byte.
    pub const MAX_GUARDIANS: usize = u8::MAX as usize + 1;

    /// Build a snapshot from ordered, distinct guardian addresses.
    ///
    /// # Panics
    ///
    /// Panics if `keys` holds more than [`Self::MAX_GUARDIANS`] entries or
    /// contains a duplicate address.
    pub fn new(keys: Vec<Address>, index: u32) -> Self {
        assert!(
            keys.len() <= Self::MAX_GUARDIANS,
            "guardian set of {} exceeds the supported maximum of {}",
            keys.len(),
            Self::MAX_GUARDIANS
        );
        let key_index: HashMap<Address, usize> = keys
            .iter()
            .enumerate()
            .map(|(position, addr)| (*addr, position))
            .collect();
        assert_eq!(
            key_index.len(),
            keys.len(),
            "guardian set contains duplicate addresses"
        );
        Self {
            keys,
            key_index,
            index,
        }
    }

    /// Guardian addresses in canonical order.
    pub fn keys(&self) -> &[Address] {
        &self.keys
    }

    /// Number of guardians in the set.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Version number of this set.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Position of a guardian in the canonical order, if it is a member.
    pub fn key_index(&self, addr: &Address) -> Option<usize> {
        self.key_index.get(addr).copied()
    }

    /// Whether an address belongs to this set.
    pub fn contains(&self, addr: &Address) -> bool {
        self.key_index.contains_key(addr)
    }

    /// Number of signatures required for quorum over this set.
    pub fn quorum(&self) -> usize {
        quorum_count(self.keys.len())
    }
}
