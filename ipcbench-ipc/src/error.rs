//! IPC error type
//!
//! Every OS call in this crate is checked; an unrecoverable errno surfaces
//! as [`IpcError::Os`] carrying the call name and the captured
//! `std::io::Error`. Measurement context is lost on any such failure, so
//! callers treat these as fatal for the probe.

use thiserror::Error;

/// Errors from the IPC plumbing.
#[derive(Debug, Error)]
pub enum IpcError {
    /// A syscall failed; `call` names it and `source` carries errno.
    #[error("{call} failed: {source}")]
    Os {
        /// The failing libc call.
        call: &'static str,
        /// The captured OS error.
        #[source]
        source: std::io::Error,
    },

    /// A resource name contained an interior NUL byte.
    #[error("invalid resource name {0:?}")]
    InvalidName(String),

    /// Participants disagreed on the barrier size.
    #[error("barrier {id:?}: joined with {got} required participants, expected {expected}")]
    ParticipantMismatch {
        /// Barrier identifier.
        id: String,
        /// Participant count this process was constructed with.
        expected: u64,
        /// Participant count already recorded in shared state.
        got: u64,
    },

    /// A child process exited with a non-zero status.
    #[error("child process {pid} exited with status {status}")]
    ChildFailed {
        /// The child's pid.
        pid: i32,
        /// The raw wait status.
        status: i32,
    },
}

impl IpcError {
    /// Capture `errno` for a failing `call`.
    pub(crate) fn os(call: &'static str) -> Self {
        IpcError::Os {
            call,
            source: std::io::Error::last_os_error(),
        }
    }
}
