//! Named pipe (FIFO) bandwidth
//!
//! The FIFO node is created once under the temp directory; each round both
//! sides reopen it. The blocking opens rendezvous with each other, then the
//! barrier aligns the timed windows.

use super::streaming::{recv_chunks, send_chunks};
use super::GIB;
use anyhow::{bail, Context};
use ipcbench_core::{generate, run_bandwidth, verify, BenchmarkResult, Timer};
use ipcbench_ipc::{exit_child, fork, unique_name, Fork, IpcError, ProcessBarrier};
use std::ffi::CString;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

fn fifo_path() -> PathBuf {
    std::env::temp_dir().join(unique_name("ipcbench_fifo.pipe"))
}

fn mkfifo(path: &Path) -> anyhow::Result<()> {
    let cpath = CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| IpcError::InvalidName(path.display().to_string()))?;
    // SAFETY: cpath is a valid NUL-terminated string.
    if unsafe { libc::mkfifo(cpath.as_ptr(), 0o644) } != 0 {
        return Err(IpcError::Os {
            call: "mkfifo",
            source: std::io::Error::last_os_error(),
        }
        .into());
    }
    Ok(())
}

fn send_process(
    path: &Path,
    barrier_id: &str,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk: usize,
) -> anyhow::Result<()> {
    let mut barrier = ProcessBarrier::new(barrier_id, 2)?;
    let payload = generate(payload_bytes as usize);

    let result = run_bandwidth(iterations, warmups, payload_bytes, |_, _| {
        // Blocks until the receiver has the read end open.
        let mut writer = OpenOptions::new()
            .write(true)
            .open(path)
            .context("open fifo for writing")?;
        barrier.wait()?;

        let timer = Timer::start();
        send_chunks(&mut writer, &payload, chunk)?;
        let elapsed = timer.elapsed();

        barrier.wait()?;
        Ok::<_, anyhow::Error>(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "fifo send bandwidth");
    Ok(())
}

fn receive_process(
    path: &Path,
    barrier_id: &str,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk: usize,
) -> anyhow::Result<BenchmarkResult> {
    let mut barrier = ProcessBarrier::new(barrier_id, 2)?;
    let payload_len = payload_bytes as usize;
    let mut scratch = vec![0u8; chunk];

    let result = run_bandwidth(iterations, warmups, payload_bytes, |i, _| {
        let mut reader = OpenOptions::new()
            .read(true)
            .open(path)
            .context("open fifo for reading")?;
        let mut received = Vec::with_capacity(payload_len);
        barrier.wait()?;

        let timer = Timer::start();
        recv_chunks(&mut reader, &mut received, &mut scratch, payload_len)?;
        let elapsed = timer.elapsed();

        if received.len() < payload_len {
            bail!(
                "fifo stream ended after {} of {} bytes (iteration {i})",
                received.len(),
                payload_len
            );
        }
        barrier.wait()?;
        if !verify(&received, payload_len) {
            bail!("fifo payload verification failed (iteration {i})");
        }
        Ok(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "fifo receive bandwidth");
    Ok(result)
}

/// FIFO bandwidth between a forked sender and the receiving parent.
pub fn run(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk_bytes: u64,
) -> anyhow::Result<BenchmarkResult> {
    let path = fifo_path();
    let barrier_id = unique_name("/ipcbench_fifo");
    ProcessBarrier::clear(&barrier_id);
    let _ = std::fs::remove_file(&path);
    mkfifo(&path)?;

    match fork()? {
        Fork::Child => {
            let code = match send_process(
                &path,
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk_bytes as usize,
            ) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!(error = %e, "fifo sender failed");
                    1
                }
            };
            exit_child(code)
        }
        Fork::Parent(child) => {
            let result = receive_process(
                &path,
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk_bytes as usize,
            );
            let result = child.finish(result);
            let _ = std::fs::remove_file(&path);
            ProcessBarrier::clear(&barrier_id);
            result
        }
    }
}
