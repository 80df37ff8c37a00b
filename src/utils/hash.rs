//! Content hashing for shader deduplication.
//!
//! Expanded shader sources are keyed by a 128-bit xxh3 digest. The seed is a
//! fixed constant so digests are stable across runs and platforms, which lets
//! debug dumps and logs be correlated between sessions.

use xxhash_rust::xxh3::xxh3_128_with_seed;

/// Seed used for every content hash produced by this crate.
pub const HASH_SEED: u64 = 0x3A8E_FA67;

/// Hashes `bytes` with xxh3-128 and [`HASH_SEED`].
#[inline]
#[must_use]
pub fn hash_128(bytes: &[u8]) -> u128 {
    xxh3_128_with_seed(bytes, HASH_SEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_input_identical_hash() {
        let a = hash_128(b"@property( foo ) x @end");
        let b = hash_128(b"@property( foo ) x @end");
        assert_eq!(a, b);
    }

    #[test]
    fn one_byte_changes_hash() {
        assert_ne!(hash_128(b"threads = 64"), hash_128(b"threads = 65"));
    }

    #[test]
    fn seed_is_applied() {
        let unseeded = xxhash_rust::xxh3::xxh3_128(b"kernel");
        assert_ne!(hash_128(b"kernel"), unseeded);
    }
}
