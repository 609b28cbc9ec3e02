//! Fork plumbing for two-process probes
//!
//! Bandwidth probes fork a sender child and keep the receiver in the
//! parent. The child must leave via [`exit_child`] (no destructors, no
//! stdio flushing in a forked copy); the parent reaps it with
//! [`Child::wait`], which fails if the child reported a non-zero status.

use crate::error::IpcError;

/// Result of [`fork`], seen from each side.
pub enum Fork {
    /// This is the parent; reap the child with [`Child::wait`].
    Parent(Child),
    /// This is the child process.
    Child,
}

/// Handle to a forked child process.
pub struct Child {
    pid: libc::pid_t,
}

/// Fork the current process.
pub fn fork() -> Result<Fork, IpcError> {
    // SAFETY: plain fork; the probe children only touch fds, libc IPC and
    // their own memory before _exit.
    let pid = unsafe { libc::fork() };
    match pid {
        -1 => Err(IpcError::os("fork")),
        0 => Ok(Fork::Child),
        pid => Ok(Fork::Parent(Child { pid })),
    }
}

/// Terminate a forked child immediately, skipping atexit handlers and
/// buffered-stdio flushing that belong to the parent.
pub fn exit_child(code: i32) -> ! {
    // SAFETY: _exit is always safe to call.
    unsafe { libc::_exit(code) }
}

impl Child {
    /// The child's process id.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Forcibly terminate the child. Used when the parent's side of a probe
    /// already failed and the child may be blocked on a rendezvous that
    /// will never complete.
    pub fn kill(&self) {
        // SAFETY: pid is a child of this process.
        unsafe { libc::kill(self.pid, libc::SIGKILL) };
    }

    /// Combine the parent's probe outcome with the child's exit status.
    ///
    /// On a parent-side error the child is killed before reaping so a peer
    /// stuck in a barrier or blocking read cannot wedge the run; the
    /// parent's error is the one reported.
    pub fn finish<T, E>(self, result: Result<T, E>) -> Result<T, E>
    where
        E: From<IpcError>,
    {
        match result {
            Ok(value) => {
                self.wait()?;
                Ok(value)
            }
            Err(e) => {
                self.kill();
                let _ = self.wait();
                Err(e)
            }
        }
    }

    /// Block until the child exits. A non-zero exit status (the child's
    /// side of the probe failed) is an error.
    pub fn wait(self) -> Result<(), IpcError> {
        let mut status: libc::c_int = 0;
        loop {
            // SAFETY: pid is a child of this process, status is valid storage.
            if unsafe { libc::waitpid(self.pid, &mut status, 0) } == self.pid {
                break;
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(IpcError::Os {
                    call: "waitpid",
                    source: err,
                });
            }
        }

        if libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0 {
            Ok(())
        } else {
            Err(IpcError::ChildFailed {
                pid: self.pid,
                status,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_exit_status_is_observed() {
        match fork().unwrap() {
            Fork::Child => exit_child(0),
            Fork::Parent(child) => child.wait().unwrap(),
        }
    }

    #[test]
    fn failing_child_is_reported() {
        match fork().unwrap() {
            Fork::Child => exit_child(3),
            Fork::Parent(child) => {
                assert!(matches!(child.wait(), Err(IpcError::ChildFailed { .. })));
            }
        }
    }

    #[test]
    fn finish_reaps_a_stuck_child_on_parent_error() {
        match fork().unwrap() {
            Fork::Child => {
                // Simulate a peer wedged on a rendezvous that never comes.
                loop {
                    std::thread::sleep(std::time::Duration::from_millis(50));
                }
            }
            Fork::Parent(child) => {
                let outcome: Result<(), IpcError> = Err(IpcError::os("test"));
                assert!(child.finish(outcome).is_err());
                // finish returned, so the child was killed and reaped.
            }
        }
    }
}
