//! Process-shared memory mappings
//!
//! Two flavours back the shared-buffer transports and the barrier state:
//! [`ShmRegion`] maps a POSIX shared-memory object, [`FileRegion`] maps a
//! regular file. Both unmap and close on drop; unlinking the backing name
//! is explicit because ownership of the name outlives any single mapping.

use crate::error::IpcError;
use std::ffi::CString;
use std::path::Path;
use std::ptr::NonNull;

fn c_name(name: &str) -> Result<CString, IpcError> {
    CString::new(name).map_err(|_| IpcError::InvalidName(name.to_string()))
}

/// Map `len` bytes of `fd` shared and read-write. Closes `fd` on failure.
fn map_fd(fd: i32, len: usize) -> Result<NonNull<u8>, IpcError> {
    // SAFETY: fd is a live descriptor sized to at least len bytes.
    let addr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        let err = IpcError::os("mmap");
        // SAFETY: fd is live and owned by the caller's setup path.
        unsafe { libc::close(fd) };
        return Err(err);
    }
    Ok(NonNull::new(addr as *mut u8).expect("mmap returned null but not MAP_FAILED"))
}

/// A mapped POSIX shared-memory object.
pub struct ShmRegion {
    name: String,
    ptr: NonNull<u8>,
    len: usize,
    fd: i32,
}

// SAFETY: the mapping is process-shared by construction; synchronization of
// the bytes inside is the caller's contract (the barrier's semaphore, the
// pipeline's barrier ticks).
unsafe impl Send for ShmRegion {}

impl ShmRegion {
    /// Create the object exclusively, size it, zero it, and map it.
    pub fn create(name: &str, len: usize) -> Result<Self, IpcError> {
        let cname = c_name(name)?;
        // SAFETY: cname is a valid NUL-terminated string.
        let fd = unsafe {
            libc::shm_open(
                cname.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o644,
            )
        };
        if fd < 0 {
            return Err(IpcError::os("shm_open"));
        }
        Self::finish_create(name, fd, len, &cname)
    }

    /// Open an existing object and map `len` bytes of it.
    pub fn open(name: &str, len: usize) -> Result<Self, IpcError> {
        let cname = c_name(name)?;
        // SAFETY: cname is a valid NUL-terminated string.
        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDWR, 0) };
        if fd < 0 {
            return Err(IpcError::os("shm_open"));
        }
        let ptr = map_fd(fd, len)?;
        tracing::debug!(name, len, "opened shared memory region");
        Ok(Self {
            name: name.to_string(),
            ptr,
            len,
            fd,
        })
    }

    /// Create the object if absent, otherwise open it. The boolean is true
    /// when this call created (and zero-initialized) the object.
    ///
    /// Callers serialize this against concurrent creators with an external
    /// lock; the barrier does so under its named semaphore.
    pub fn open_or_create(name: &str, len: usize) -> Result<(Self, bool), IpcError> {
        match Self::create(name, len) {
            Ok(region) => Ok((region, true)),
            Err(IpcError::Os { source, .. })
                if source.raw_os_error() == Some(libc::EEXIST) =>
            {
                tracing::debug!(name, "shared memory exists, opening instead");
                Ok((Self::open(name, len)?, false))
            }
            Err(e) => Err(e),
        }
    }

    fn finish_create(
        name: &str,
        fd: i32,
        len: usize,
        cname: &CString,
    ) -> Result<Self, IpcError> {
        // SAFETY: fd is live; len fits off_t for any sane region size.
        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = IpcError::os("ftruncate");
            unsafe {
                libc::close(fd);
                libc::shm_unlink(cname.as_ptr());
            }
            return Err(err);
        }
        let ptr = map_fd(fd, len)?;
        // SAFETY: the mapping spans len writable bytes.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
        tracing::debug!(name, len, "created shared memory region");
        Ok(Self {
            name: name.to_string(),
            ptr,
            len,
            fd,
        })
    }

    /// Raw base pointer of the mapping.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Name of the backing object.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the name from the system. Missing names are ignored.
    pub fn unlink(name: &str) {
        let Ok(cname) = c_name(name) else { return };
        // SAFETY: cname is a valid NUL-terminated string.
        if unsafe { libc::shm_unlink(cname.as_ptr()) } != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                tracing::error!(name, %err, "shm_unlink failed");
            }
        }
    }

    /// Whether an object of this name currently exists.
    pub fn exists(name: &str) -> bool {
        let Ok(cname) = c_name(name) else {
            return false;
        };
        // SAFETY: cname is a valid NUL-terminated string.
        let fd = unsafe { libc::shm_open(cname.as_ptr(), libc::O_RDONLY, 0) };
        if fd >= 0 {
            // SAFETY: fd was just opened.
            unsafe { libc::close(fd) };
            true
        } else {
            false
        }
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        // SAFETY: ptr/len describe the live mapping; fd is live.
        unsafe {
            if libc::munmap(self.ptr.as_ptr().cast(), self.len) != 0 {
                tracing::error!(
                    name = %self.name,
                    err = %std::io::Error::last_os_error(),
                    "munmap failed"
                );
            }
            libc::close(self.fd);
        }
    }
}

/// A shared mapping of a regular file, used by the `mmap` bandwidth probe.
pub struct FileRegion {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: same contract as ShmRegion.
unsafe impl Send for FileRegion {}

impl FileRegion {
    /// Create (or truncate) `path`, size it to `len`, zero it, and map it.
    pub fn create(path: &Path, len: usize) -> Result<Self, IpcError> {
        let cpath = c_name(&path.to_string_lossy())?;
        // SAFETY: cpath is a valid NUL-terminated string.
        let fd = unsafe {
            libc::open(
                cpath.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_TRUNC,
                0o644 as libc::c_uint,
            )
        };
        if fd < 0 {
            return Err(IpcError::os("open"));
        }
        // SAFETY: fd is live.
        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = IpcError::os("ftruncate");
            unsafe { libc::close(fd) };
            return Err(err);
        }
        let ptr = map_fd(fd, len)?;
        // SAFETY: the mapping spans len writable bytes.
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
        // SAFETY: the mapping stays valid after the descriptor closes.
        unsafe { libc::close(fd) };
        tracing::debug!(path = %path.display(), len, "created file-backed region");
        Ok(Self { ptr, len })
    }

    /// Open `path` and map its full current size.
    pub fn open(path: &Path) -> Result<Self, IpcError> {
        let cpath = c_name(&path.to_string_lossy())?;
        // SAFETY: cpath is a valid NUL-terminated string.
        let fd = unsafe { libc::open(cpath.as_ptr(), libc::O_RDWR) };
        if fd < 0 {
            return Err(IpcError::os("open"));
        }
        // SAFETY: fd is live; stat buffer is zeroed storage.
        let len = unsafe {
            let mut st: libc::stat = std::mem::zeroed();
            if libc::fstat(fd, &mut st) != 0 {
                let err = IpcError::os("fstat");
                libc::close(fd);
                return Err(err);
            }
            st.st_size as usize
        };
        let ptr = map_fd(fd, len)?;
        // SAFETY: the mapping stays valid after the descriptor closes.
        unsafe { libc::close(fd) };
        Ok(Self { ptr, len })
    }

    /// Raw base pointer of the mapping.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Mapped length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for FileRegion {
    fn drop(&mut self) {
        // SAFETY: ptr/len describe the live mapping.
        if unsafe { libc::munmap(self.ptr.as_ptr().cast(), self.len) } != 0 {
            tracing::error!(
                err = %std::io::Error::last_os_error(),
                "munmap failed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::unique_name;

    #[test]
    fn create_write_reopen_read() {
        let name = unique_name("/ipcbench_region_test");
        ShmRegion::unlink(&name);

        let region = ShmRegion::create(&name, 4096).unwrap();
        // SAFETY: freshly created region, single mapping in this test.
        unsafe { *region.as_ptr() = 0xAB };

        let other = ShmRegion::open(&name, 4096).unwrap();
        // SAFETY: both mappings alias the same object; no concurrent writer.
        assert_eq!(unsafe { *other.as_ptr() }, 0xAB);

        drop(region);
        drop(other);
        ShmRegion::unlink(&name);
        assert!(!ShmRegion::exists(&name));
    }

    #[test]
    fn create_is_exclusive() {
        let name = unique_name("/ipcbench_region_test");
        ShmRegion::unlink(&name);

        let _first = ShmRegion::create(&name, 4096).unwrap();
        assert!(ShmRegion::create(&name, 4096).is_err());
        let (_second, created) = ShmRegion::open_or_create(&name, 4096).unwrap();
        assert!(!created);

        ShmRegion::unlink(&name);
    }

    #[test]
    fn created_region_is_zeroed() {
        let name = unique_name("/ipcbench_region_test");
        ShmRegion::unlink(&name);

        let region = ShmRegion::create(&name, 1024).unwrap();
        // SAFETY: single mapping, no concurrent access.
        let bytes = unsafe { std::slice::from_raw_parts(region.as_ptr(), 1024) };
        assert!(bytes.iter().all(|&b| b == 0));

        drop(region);
        ShmRegion::unlink(&name);
    }

    #[test]
    fn file_region_roundtrip() {
        let path = std::env::temp_dir().join(unique_name("ipcbench_region_test.dat"));

        let region = FileRegion::create(&path, 8192).unwrap();
        // SAFETY: single mapping in this test.
        unsafe { *region.as_ptr().add(100) = 7 };

        let other = FileRegion::open(&path).unwrap();
        assert_eq!(other.len(), 8192);
        // SAFETY: no concurrent writer at this point.
        assert_eq!(unsafe { *other.as_ptr().add(100) }, 7);

        drop(region);
        drop(other);
        std::fs::remove_file(&path).unwrap();
    }
}
