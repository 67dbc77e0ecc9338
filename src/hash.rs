//! Key hashing
//!
//! A key's home bucket is `hash(key) % initial_bucket_count` in every
//! generation. Placements are persisted, so the hash must be deterministic
//! across processes and must never change for an existing file.

/// Signature of a bucket hash function
pub type HashFunction = fn(&[u8]) -> u64;

/// Dan Bernstein's multiplicative string hash: `h = h * 33 + byte`, seed 5381.
///
/// Consumes bytes up to the first zero byte, so a key and its NUL-terminated
/// on-disk copy hash identically.
///
/// Bytes are added as unsigned values. C builds where `char` is signed (x86)
/// sign-extend bytes of 0x80 and above, so stores they wrote with non-ASCII
/// keys place those keys in different buckets than this function does.
pub fn djb2(key: &[u8]) -> u64 {
    let mut hash: u64 = 5381;
    for &byte in key.iter().take_while(|&&b| b != 0) {
        hash = hash.wrapping_mul(33).wrapping_add(u64::from(byte));
    }
    hash
}

/// Home bucket of a hash within a generation of `bucket_count` buckets
#[inline]
pub(crate) fn bucket_index(hash: u64, bucket_count: u32) -> u32 {
    debug_assert!(bucket_count > 0);
    // The remainder is always below bucket_count, which is a u32
    (hash % u64::from(bucket_count)) as u32
}
