//! Bandwidth probes
//!
//! Each probe moves a checksummed payload of `payload_bytes` bytes from a
//! sender to a receiver, in chunks of at most `chunk_bytes` for the
//! streaming transports. Multi-process probes fork: the child sends, the
//! parent receives, and only the receiver's timings are reported. The
//! receiver verifies the payload every round; a mismatch is fatal for the
//! probe.

pub mod fifo;
pub mod memcpy;
pub mod mq;
pub mod pipe;
pub mod shared;
mod streaming;
pub mod tcp;
pub mod uds;

/// Scale for logging bandwidths in GiByte/sec.
pub(crate) const GIB: f64 = (1u64 << 30) as f64;
