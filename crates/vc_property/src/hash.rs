//! Hash containers and the deterministic hasher used for value hashing.
//!
//! Value hashes feed the open-addressed index of set and map containers, so
//! they must not change between runs. The state is a fixed-seed `foldhash`.

use core::hash::{BuildHasher, Hasher};

/// Fixed-seed hash state, stable across processes.
pub type FixedHashState = foldhash::fast::FixedState;

/// A `hashbrown` map using [`FixedHashState`].
pub type HashMap<K, V> = hashbrown::HashMap<K, V, FixedHashState>;

const HASH_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

#[inline]
pub(crate) fn fixed_state() -> FixedHashState {
    FixedHashState::with_seed(HASH_SEED)
}

#[inline]
pub(crate) fn new_map<K, V>() -> HashMap<K, V> {
    HashMap::with_hasher(fixed_state())
}

#[inline]
pub(crate) fn new_hasher() -> impl Hasher {
    fixed_state().build_hasher()
}

/// Mixes a child hash into a running hash, order dependent.
#[inline]
pub(crate) fn combine(seed: u64, value: u64) -> u64 {
    let mut hasher = new_hasher();
    hasher.write_u64(seed);
    hasher.write_u64(value);
    hasher.finish()
}
