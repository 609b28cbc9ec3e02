#![warn(missing_docs)]
//! ipcbench probes
//!
//! Concrete probe bodies, one module per transport or primitive. Latency
//! probes measure nanoseconds per single operation over a tight inner loop;
//! bandwidth probes measure bytes per second moving a checksummed payload
//! from a sender to a receiver. All probes reduce their samples through the
//! harness loops in `ipcbench-core`.

pub mod bandwidth;
pub mod latency;
