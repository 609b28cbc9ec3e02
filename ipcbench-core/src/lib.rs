#![warn(missing_docs)]
//! ipcbench core - measurement harness
//!
//! This crate provides the pieces every probe is built from:
//! - `Timer` for monotonic high-resolution timing
//! - the checksum-carrying payload codec for bandwidth probes
//! - the outer-iteration loops for latency and bandwidth probes, which
//!   collect per-iteration samples and reduce them with trimmed statistics

mod harness;
mod measure;
mod payload;

pub use harness::{run_bandwidth, run_latency, BenchmarkResult};
pub use measure::Timer;
pub use payload::{generate, verify, CHECKSUM_LEN};
