//! Named POSIX semaphore wrapper
//!
//! Thin RAII wrapper over `sem_open`/`sem_wait`/`sem_post`. The handle is
//! closed on drop; unlinking the name is a separate, explicit operation
//! because ownership of the name is decided by the caller (the barrier's
//! last participant, the semaphore probe's parent).

use crate::error::IpcError;
use std::ffi::CString;

/// A named, process-shared POSIX semaphore.
pub struct NamedSemaphore {
    name: String,
    raw: *mut libc::sem_t,
}

// SAFETY: sem_wait/sem_post on a sem_open handle are thread-safe; the raw
// pointer refers to kernel-managed state, not to memory owned by this struct.
unsafe impl Send for NamedSemaphore {}
unsafe impl Sync for NamedSemaphore {}

fn c_name(name: &str) -> Result<CString, IpcError> {
    CString::new(name).map_err(|_| IpcError::InvalidName(name.to_string()))
}

impl NamedSemaphore {
    /// Open the semaphore `name`, creating it with `initial` tokens if it
    /// does not exist yet.
    pub fn create(name: &str, initial: u32) -> Result<Self, IpcError> {
        let cname = c_name(name)?;
        // SAFETY: cname is a valid NUL-terminated string; O_CREAT with mode
        // and value is the documented 4-argument form of sem_open.
        let raw = unsafe {
            libc::sem_open(
                cname.as_ptr(),
                libc::O_CREAT,
                0o644 as libc::c_uint,
                initial as libc::c_uint,
            )
        };
        if raw == libc::SEM_FAILED {
            return Err(IpcError::os("sem_open"));
        }
        tracing::debug!(name, initial, "opened semaphore");
        Ok(Self {
            name: name.to_string(),
            raw,
        })
    }

    /// Open an existing semaphore.
    pub fn open(name: &str) -> Result<Self, IpcError> {
        let cname = c_name(name)?;
        // SAFETY: cname is a valid NUL-terminated string.
        let raw = unsafe { libc::sem_open(cname.as_ptr(), 0) };
        if raw == libc::SEM_FAILED {
            return Err(IpcError::os("sem_open"));
        }
        Ok(Self {
            name: name.to_string(),
            raw,
        })
    }

    /// Decrement the semaphore, blocking until a token is available.
    /// Restarts on EINTR.
    pub fn wait(&self) -> Result<(), IpcError> {
        loop {
            // SAFETY: raw is a live handle from sem_open.
            if unsafe { libc::sem_wait(self.raw) } == 0 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(IpcError::Os {
                    call: "sem_wait",
                    source: err,
                });
            }
        }
    }

    /// Increment the semaphore, waking one waiter.
    pub fn post(&self) -> Result<(), IpcError> {
        // SAFETY: raw is a live handle from sem_open.
        if unsafe { libc::sem_post(self.raw) } != 0 {
            return Err(IpcError::os("sem_post"));
        }
        Ok(())
    }

    /// The name this semaphore was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the name from the system. Missing names are ignored; other
    /// failures are logged because unlink runs on teardown paths.
    pub fn unlink(name: &str) {
        let Ok(cname) = c_name(name) else { return };
        // SAFETY: cname is a valid NUL-terminated string.
        if unsafe { libc::sem_unlink(cname.as_ptr()) } != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                tracing::error!(name, %err, "sem_unlink failed");
            }
        }
    }
}

impl Drop for NamedSemaphore {
    fn drop(&mut self) {
        // SAFETY: raw is a live handle; close exactly once.
        if unsafe { libc::sem_close(self.raw) } != 0 {
            tracing::error!(
                name = %self.name,
                err = %std::io::Error::last_os_error(),
                "sem_close failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::unique_name;

    #[test]
    fn post_then_wait_roundtrip() {
        let name = unique_name("/ipcbench_sem_test");
        NamedSemaphore::unlink(&name);

        let sem = NamedSemaphore::create(&name, 0).unwrap();
        sem.post().unwrap();
        sem.wait().unwrap();

        NamedSemaphore::unlink(&name);
    }

    #[test]
    fn second_open_sees_same_semaphore() {
        let name = unique_name("/ipcbench_sem_test");
        NamedSemaphore::unlink(&name);

        let a = NamedSemaphore::create(&name, 1).unwrap();
        let b = NamedSemaphore::open(&name).unwrap();
        a.wait().unwrap();
        b.post().unwrap();
        a.wait().unwrap();

        NamedSemaphore::unlink(&name);
    }

    #[test]
    fn open_of_missing_name_fails() {
        let name = unique_name("/ipcbench_sem_missing");
        assert!(NamedSemaphore::open(&name).is_err());
    }

    #[test]
    fn interior_nul_is_rejected() {
        assert!(matches!(
            NamedSemaphore::create("/bad\0name", 0),
            Err(IpcError::InvalidName(_))
        ));
    }
}
