//! Payload generation and checksum verification
//!
//! Bandwidth probes transport a pseudo-random payload whose last
//! [`CHECKSUM_LEN`] bytes are an XOR fold of everything before them. The
//! receiver recomputes the fold; a mismatch means the transport lost or
//! corrupted bytes and the measured bandwidth is meaningless.

use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};

/// Length of the checksum suffix in bytes; also the number of XOR buckets.
pub const CHECKSUM_LEN: usize = 128;

/// XOR-fold `content` into [`CHECKSUM_LEN`] buckets indexed by position.
fn fold_checksum(content: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut checksum = [0u8; CHECKSUM_LEN];
    for (i, byte) in content.iter().enumerate() {
        checksum[i % CHECKSUM_LEN] ^= byte;
    }
    checksum
}

/// Generate a payload of exactly `len` bytes: a pseudo-random prefix
/// followed by its checksum.
///
/// The prefix is filled one 64-bit word at a time from a freshly seeded
/// [`SmallRng`]; determinism is only needed within a single invocation, so a
/// fresh seed per call is fine.
///
/// # Panics
/// `len` must be strictly greater than [`CHECKSUM_LEN`].
pub fn generate(len: usize) -> Vec<u8> {
    assert!(
        len > CHECKSUM_LEN,
        "payload length ({len}) must exceed the checksum length ({CHECKSUM_LEN})"
    );
    let content_len = len - CHECKSUM_LEN;
    tracing::debug!(len, "generating payload");

    let mut rng = SmallRng::from_entropy();
    let mut data = vec![0u8; len];

    let mut chunks = data[..content_len].chunks_exact_mut(8);
    for chunk in &mut chunks {
        chunk.copy_from_slice(&rng.next_u64().to_le_bytes());
    }
    for byte in chunks.into_remainder() {
        *byte = rng.next_u64() as u8;
    }

    let checksum = fold_checksum(&data[..content_len]);
    data[content_len..].copy_from_slice(&checksum);
    data
}

/// Verify a received payload of expected length `len`.
///
/// True iff the buffer has exactly `len` bytes and its checksum suffix
/// equals the fold of the prefix. A false return is a hard failure for the
/// probe that transported the buffer.
///
/// # Panics
/// `len` must be strictly greater than [`CHECKSUM_LEN`].
pub fn verify(buf: &[u8], len: usize) -> bool {
    assert!(
        len > CHECKSUM_LEN,
        "payload length ({len}) must exceed the checksum length ({CHECKSUM_LEN})"
    );
    if buf.len() != len {
        tracing::error!(expected = len, got = buf.len(), "payload size mismatch");
        return false;
    }

    let content_len = len - CHECKSUM_LEN;
    let checksum = fold_checksum(&buf[..content_len]);
    for i in 0..CHECKSUM_LEN {
        if buf[content_len + i] != checksum[i] {
            tracing::error!(
                index = i,
                expected = checksum[i],
                got = buf[content_len + i],
                "checksum mismatch"
            );
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_payload_verifies() {
        for len in [CHECKSUM_LEN + 1, 256, 1000, 4096, 1 << 16] {
            let data = generate(len);
            assert_eq!(data.len(), len);
            assert!(verify(&data, len), "len {len} failed to verify");
        }
    }

    #[test]
    fn flipped_content_byte_fails_verification() {
        let len = 1024;
        for index in [0, 1, 127, 128, 500, len - CHECKSUM_LEN - 1] {
            let mut data = generate(len);
            data[index] ^= 0x01;
            assert!(!verify(&data, len), "flip at {index} went undetected");
        }
    }

    #[test]
    fn flipped_checksum_byte_fails_verification() {
        let len = 512;
        let mut data = generate(len);
        data[len - 1] ^= 0xff;
        assert!(!verify(&data, len));
    }

    #[test]
    fn wrong_length_fails_verification() {
        let data = generate(300);
        assert!(!verify(&data[..299], 300));
    }

    #[test]
    #[should_panic(expected = "must exceed the checksum length")]
    fn payload_no_larger_than_checksum_panics() {
        generate(CHECKSUM_LEN);
    }
}
