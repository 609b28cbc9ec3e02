//! Unix-domain socket bandwidth
//!
//! Same round shape as the TCP probe, but over a stream socket bound to a
//! unique path under the temp directory. The receiver rebinds per round;
//! the path is removed on teardown.

use super::streaming::{recv_chunks, send_chunks};
use super::GIB;
use anyhow::{bail, Context};
use ipcbench_core::{generate, run_bandwidth, verify, BenchmarkResult, Timer};
use ipcbench_ipc::{exit_child, fork, unique_name, Fork, ProcessBarrier};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};

fn socket_path() -> PathBuf {
    std::env::temp_dir().join(unique_name("ipcbench_uds.sock"))
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
        barrier.wait()?;
        let mut stream = UnixStream::connect(path).context("connect to receiver")?;
        barrier.wait()?;

        let timer = Timer::start();
        send_chunks(&mut stream, &payload, chunk)?;
        let elapsed = timer.elapsed();

        barrier.wait()?;
        Ok::<_, anyhow::Error>(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "uds send bandwidth");
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
        let _ = std::fs::remove_file(path);
        let listener = UnixListener::bind(path).context("bind socket")?;
        barrier.wait()?;
        let (mut conn, _) = listener.accept().context("accept sender")?;
        tracing::debug!(path = %path.display(), "sender connected");

        let mut received = Vec::with_capacity(payload_len);
        barrier.wait()?;

        let timer = Timer::start();
        recv_chunks(&mut conn, &mut received, &mut scratch, payload_len)?;
        let elapsed = timer.elapsed();

        if received.len() < payload_len {
            bail!(
                "uds stream ended after {} of {} bytes (iteration {i})",
                received.len(),
                payload_len
            );
        }
        barrier.wait()?;
        if !verify(&received, payload_len) {
            bail!("uds payload verification failed (iteration {i})");
        }
        Ok(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "uds receive bandwidth");
    Ok(result)
}

/// Unix-domain socket bandwidth between a forked sender and the receiving
/// parent.
pub fn run(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk_bytes: u64,
) -> anyhow::Result<BenchmarkResult> {
    let path = socket_path();
    let barrier_id = unique_name("/ipcbench_uds");
    ProcessBarrier::clear(&barrier_id);
    let _ = std::fs::remove_file(&path);

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
                    tracing::error!(error = %e, "uds sender failed");
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
