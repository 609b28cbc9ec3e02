//! Unique resource names
//!
//! Named OS objects (shared memory, semaphores, FIFOs, sockets, message
//! queues) get a random 32-bit hex suffix so concurrent runs on the same
//! host do not collide.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Append a random 8-hex-digit suffix to `base`.
///
/// If `base` has a file extension the suffix is inserted before it, so
/// `"fifo.pipe"` becomes `"fifo_1a2b3c4d.pipe"`.
pub fn unique_name(base: &str) -> String {
    let suffix: u32 = SmallRng::from_entropy().gen();
    match base.rfind('.') {
        Some(dot) => format!("{}_{:08x}{}", &base[..dot], suffix, &base[dot..]),
        None => format!("{}_{:08x}", base, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_appended() {
        let name = unique_name("/bench");
        assert!(name.starts_with("/bench_"));
        assert_eq!(name.len(), "/bench_".len() + 8);
        let suffix = &name["/bench_".len()..];
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn suffix_goes_before_extension() {
        let name = unique_name("fifo.pipe");
        assert!(name.starts_with("fifo_"));
        assert!(name.ends_with(".pipe"));
    }

    #[test]
    fn names_are_distinct_across_calls() {
        // 32 random bits: a handful of draws should never collide.
        let names: std::collections::HashSet<_> =
            (0..16).map(|_| unique_name("/bench")).collect();
        assert_eq!(names.len(), 16);
    }
}
