//! Syscall latency probes: statfs, fstatfs, getpid
//!
//! Pure syscall throughput on a single thread; one loop pass is one
//! syscall, so `k = 1`. Each probe makes one unchecked-in-loop call after a
//! checked warmline call, keeping the tight loop branch-free.

use anyhow::Context;
use ipcbench_core::{run_latency, BenchmarkResult, Timer};
use ipcbench_ipc::IpcError;
use std::ffi::CString;

/// statfs() on the current directory.
pub fn run_statfs(iterations: u32, warmups: u32, loop_size: u64) -> anyhow::Result<BenchmarkResult> {
    let path = CString::new(".").expect("static path");
    // SAFETY: path is valid, buf is plain storage for the result.
    let mut buf: libc::statfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::statfs(path.as_ptr(), &mut buf) } != 0 {
        return Err(IpcError::Os {
            call: "statfs",
            source: std::io::Error::last_os_error(),
        })
        .context("statfs probe preflight");
    }

    run_latency(iterations, warmups, loop_size, |_| {
        let timer = Timer::start();
        for _ in 0..loop_size {
            // SAFETY: same arguments that succeeded in the preflight call.
            unsafe { libc::statfs(path.as_ptr(), &mut buf) };
        }
        Ok(timer.elapsed())
    })
}

/// fstatfs() on an open descriptor for the current directory.
pub fn run_fstatfs(
    iterations: u32,
    warmups: u32,
    loop_size: u64,
) -> anyhow::Result<BenchmarkResult> {
    let path = CString::new(".").expect("static path");
    // SAFETY: path is a valid NUL-terminated string.
    let fd = unsafe { libc::open(path.as_ptr(), libc::O_RDONLY) };
    if fd < 0 {
        return Err(IpcError::Os {
            call: "open",
            source: std::io::Error::last_os_error(),
        })
        .context("fstatfs probe preflight");
    }

    // SAFETY: fd is live, buf is plain storage.
    let mut buf: libc::statfs = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstatfs(fd, &mut buf) } != 0 {
        let err = IpcError::Os {
            call: "fstatfs",
            source: std::io::Error::last_os_error(),
        };
        // SAFETY: fd is live.
        unsafe { libc::close(fd) };
        return Err(err).context("fstatfs probe preflight");
    }

    let result = run_latency(iterations, warmups, loop_size, |_| {
        let timer = Timer::start();
        for _ in 0..loop_size {
            // SAFETY: fd stays open for the duration of the probe.
            unsafe { libc::fstatfs(fd, &mut buf) };
        }
        Ok(timer.elapsed())
    });

    // SAFETY: fd is live; closed exactly once.
    unsafe { libc::close(fd) };
    result
}

/// getpid() throughput.
pub fn run_getpid(iterations: u32, warmups: u32, loop_size: u64) -> anyhow::Result<BenchmarkResult> {
    run_latency(iterations, warmups, loop_size, |_| {
        let timer = Timer::start();
        for _ in 0..loop_size {
            // SAFETY: getpid takes no arguments and cannot fail.
            unsafe { libc::getpid() };
        }
        Ok(timer.elapsed())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getpid_probe_reports_positive_latency() {
        let result = run_getpid(3, 0, 10).unwrap();
        assert!(result.average > 0.0);
        assert!(result.stddev >= 0.0);
    }

    #[test]
    fn statfs_probe_completes() {
        let result = run_statfs(3, 0, 10).unwrap();
        assert!(result.average > 0.0);
    }

    #[test]
    fn fstatfs_probe_completes() {
        let result = run_fstatfs(3, 0, 10).unwrap();
        assert!(result.average > 0.0);
    }
}
