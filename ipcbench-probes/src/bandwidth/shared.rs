//! Shared-region bandwidth: `mmap` and `shm`
//!
//! Both probes move the payload through the double-buffered pipelined
//! transport; they differ only in how the shared region is obtained. The
//! `mmap` probe maps a file under the temp directory, the `shm` probe opens
//! a POSIX shared-memory object. The sender creates and zeroes the region
//! each round, the receiver maps it after the first barrier, and the timed
//! window covers the barrier-ticked slot exchange.

use super::GIB;
use anyhow::{bail, Context};
use ipcbench_core::{generate, run_bandwidth, verify, BenchmarkResult, Timer};
use ipcbench_ipc::{
    exit_child, fork, unique_name, DoubleBuffer, FileRegion, Fork, ProcessBarrier, ShmRegion,
};
use std::path::PathBuf;

/// How the shared region is backed.
enum Backing {
    File(PathBuf),
    Shm(String),
}

enum Region {
    File(FileRegion),
    Shm(ShmRegion),
}

impl Region {
    fn as_ptr(&self) -> *mut u8 {
        match self {
            Region::File(r) => r.as_ptr(),
            Region::Shm(r) => r.as_ptr(),
        }
    }
}

impl Backing {
    fn create(&self, len: usize) -> anyhow::Result<Region> {
        match self {
            Backing::File(path) => Ok(Region::File(
                FileRegion::create(path, len).context("create mapped file")?,
            )),
            Backing::Shm(name) => Ok(Region::Shm(
                ShmRegion::create(name, len).context("create shared memory")?,
            )),
        }
    }

    fn open(&self, len: usize) -> anyhow::Result<Region> {
        match self {
            Backing::File(path) => {
                let region = FileRegion::open(path).context("open mapped file")?;
                anyhow::ensure!(
                    region.len() >= len,
                    "mapped file is {} bytes, expected at least {len}",
                    region.len()
                );
                Ok(Region::File(region))
            }
            Backing::Shm(name) => Ok(Region::Shm(
                ShmRegion::open(name, len).context("open shared memory")?,
            )),
        }
    }

    fn unlink(&self) {
        match self {
            Backing::File(path) => {
                let _ = std::fs::remove_file(path);
            }
            Backing::Shm(name) => ShmRegion::unlink(name),
        }
    }
}

fn send_process(
    backing: &Backing,
    barrier_id: &str,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk: usize,
    label: &'static str,
) -> anyhow::Result<()> {
    let mut barrier = ProcessBarrier::new(barrier_id, 2)?;
    barrier.wait()?;

    let payload = generate(payload_bytes as usize);
    let region_len = DoubleBuffer::region_len(chunk);

    let result = run_bandwidth(iterations, warmups, payload_bytes, |_, _| {
        let region = backing.create(region_len)?;
        // Region exists and is zeroed: let the receiver map it.
        barrier.wait()?;
        barrier.wait()?;

        // SAFETY: the region spans region_len bytes; the receiver drives the
        // opposite side of the pipeline.
        let mut pipe = unsafe { DoubleBuffer::from_raw(region.as_ptr(), chunk) };

        let timer = Timer::start();
        pipe.send(&mut barrier, &payload)?;
        let elapsed = timer.elapsed();

        barrier.wait()?;
        drop(region);
        backing.unlink();
        Ok::<_, anyhow::Error>(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "{label} send bandwidth");
    Ok(())
}

fn receive_process(
    backing: &Backing,
    barrier_id: &str,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk: usize,
    label: &'static str,
) -> anyhow::Result<BenchmarkResult> {
    let mut barrier = ProcessBarrier::new(barrier_id, 2)?;
    barrier.wait()?;

    let payload_len = payload_bytes as usize;
    let region_len = DoubleBuffer::region_len(chunk);

    let result = run_bandwidth(iterations, warmups, payload_bytes, |i, _| {
        // Sender creates the region before this wait returns.
        barrier.wait()?;
        let region = backing.open(region_len)?;
        barrier.wait()?;

        // SAFETY: the region spans region_len bytes; the sender drives the
        // opposite side of the pipeline.
        let mut pipe = unsafe { DoubleBuffer::from_raw(region.as_ptr(), chunk) };

        let timer = Timer::start();
        let received = pipe.recv(&mut barrier, payload_len)?;
        let elapsed = timer.elapsed();

        barrier.wait()?;
        if !verify(&received, payload_len) {
            bail!("{label} payload verification failed (iteration {i})");
        }
        Ok(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "{label} receive bandwidth");
    Ok(result)
}

fn run_pipelined(
    backing: Backing,
    barrier_id: String,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk_bytes: u64,
    label: &'static str,
) -> anyhow::Result<BenchmarkResult> {
    ProcessBarrier::clear(&barrier_id);
    backing.unlink();

    match fork()? {
        Fork::Child => {
            let code = match send_process(
                &backing,
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk_bytes as usize,
                label,
            ) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!(error = %e, "{label} sender failed");
                    1
                }
            };
            exit_child(code)
        }
        Fork::Parent(child) => {
            let result = receive_process(
                &backing,
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk_bytes as usize,
                label,
            );
            let result = child.finish(result);
            backing.unlink();
            ProcessBarrier::clear(&barrier_id);
            result
        }
    }
}

/// Memory-mapped file bandwidth through the pipelined double buffer.
pub fn run_mmap(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk_bytes: u64,
) -> anyhow::Result<BenchmarkResult> {
    let path = std::env::temp_dir().join(unique_name("ipcbench_mmap.dat"));
    run_pipelined(
        Backing::File(path),
        unique_name("/ipcbench_mmap"),
        iterations,
        warmups,
        payload_bytes,
        chunk_bytes,
        "mmap",
    )
}

/// POSIX shared-memory bandwidth through the pipelined double buffer.
pub fn run_shm(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk_bytes: u64,
) -> anyhow::Result<BenchmarkResult> {
    run_pipelined(
        Backing::Shm(unique_name("/ipcbench_shm")),
        unique_name("/ipcbench_shm_barrier"),
        iterations,
        warmups,
        payload_bytes,
        chunk_bytes,
        "shm",
    )
}
