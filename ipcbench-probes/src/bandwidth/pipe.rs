//! Anonymous pipe bandwidth
//!
//! One pipe is created before the fork and reused for every round; the
//! barrier serializes rounds so no round's bytes can bleed into the next.

use super::streaming::{recv_chunks, send_chunks};
use super::GIB;
use anyhow::bail;
use ipcbench_core::{generate, run_bandwidth, verify, BenchmarkResult, Timer};
use ipcbench_ipc::{exit_child, fork, unique_name, Fork, IpcError, ProcessBarrier};
use std::fs::File;
use std::os::fd::FromRawFd;

fn send_process(
    writer: &mut File,
    barrier_id: &str,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk: usize,
) -> anyhow::Result<()> {
    let mut barrier = ProcessBarrier::new(barrier_id, 2)?;
    let payload = generate(payload_bytes as usize);

    let result = run_bandwidth(iterations, warmups, payload_bytes, |_, _| {
        barrier.wait()?;

        let timer = Timer::start();
        send_chunks(writer, &payload, chunk)?;
        let elapsed = timer.elapsed();

        barrier.wait()?;
        Ok::<_, anyhow::Error>(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "pipe send bandwidth");
    Ok(())
}

fn receive_process(
    reader: &mut File,
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
        let mut received = Vec::with_capacity(payload_len);
        barrier.wait()?;

        let timer = Timer::start();
        recv_chunks(reader, &mut received, &mut scratch, payload_len)?;
        let elapsed = timer.elapsed();

        // A short round means the sender died; bail before the round
        // barrier it will never reach.
        if received.len() < payload_len {
            bail!(
                "pipe stream ended after {} of {} bytes (iteration {i})",
                received.len(),
                payload_len
            );
        }
        barrier.wait()?;
        if !verify(&received, payload_len) {
            bail!("pipe payload verification failed (iteration {i})");
        }
        Ok(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "pipe receive bandwidth");
    Ok(result)
}

/// Anonymous pipe bandwidth between a forked sender and the receiving
/// parent.
pub fn run(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk_bytes: u64,
) -> anyhow::Result<BenchmarkResult> {
    let barrier_id = unique_name("/ipcbench_pipe");
    ProcessBarrier::clear(&barrier_id);

    let mut fds = [0i32; 2];
    // SAFETY: fds is valid storage for the two descriptors.
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(IpcError::Os {
            call: "pipe",
            source: std::io::Error::last_os_error(),
        }
        .into());
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    match fork()? {
        Fork::Child => {
            // SAFETY: read_fd is this process's copy of the read end.
            unsafe { libc::close(read_fd) };
            // SAFETY: write_fd is owned by this File from here on.
            let mut writer = unsafe { File::from_raw_fd(write_fd) };
            let code = match send_process(
                &mut writer,
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk_bytes as usize,
            ) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!(error = %e, "pipe sender failed");
                    1
                }
            };
            exit_child(code)
        }
        Fork::Parent(child) => {
            // SAFETY: write_fd is this process's copy of the write end.
            unsafe { libc::close(write_fd) };
            // SAFETY: read_fd is owned by this File from here on.
            let mut reader = unsafe { File::from_raw_fd(read_fd) };
            let result = receive_process(
                &mut reader,
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk_bytes as usize,
            );
            let result = child.finish(result);
            ProcessBarrier::clear(&barrier_id);
            result
        }
    }
}
