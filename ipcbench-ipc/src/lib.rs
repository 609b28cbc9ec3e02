#![warn(missing_docs)]
//! ipcbench IPC plumbing
//!
//! The race-prone pieces shared by the cross-process probes:
//! - a named process-shared binary semaphore ([`NamedSemaphore`])
//! - POSIX shared-memory and file-backed mappings ([`ShmRegion`], [`FileRegion`])
//! - a reusable sense-reversing barrier constructible by independently
//!   started processes ([`ProcessBarrier`])
//! - the double-buffered pipelined transport used by the `mmap`/`shm`
//!   bandwidth probes ([`DoubleBuffer`])
//! - a thin `fork`/`waitpid` wrapper ([`fork`], [`Child`])
//! - unique per-run resource names ([`unique_name`])

mod barrier;
mod error;
mod names;
mod pipeline;
mod process;
mod region;
mod sem;

pub use barrier::ProcessBarrier;
pub use error::IpcError;
pub use names::unique_name;
pub use pipeline::DoubleBuffer;
pub use process::{exit_child, fork, Child, Fork};
pub use region::{FileRegion, ShmRegion};
pub use sem::NamedSemaphore;
