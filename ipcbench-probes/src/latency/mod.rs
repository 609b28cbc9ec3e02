//! Latency probes
//!
//! Each probe measures the cost of one synchronization or syscall
//! operation. An outer iteration sets up the partner (thread or process),
//! times a tight loop of `loop_size` passes, and tears the partner down
//! outside the timed region. The per-iteration sample is
//! `elapsed / (loop_size * k)` where `k` is the number of single operations
//! per loop pass.

pub mod atomic;
pub mod barrier;
pub mod condvar;
pub mod semaphore;
pub mod syscall;
