//! In-process memcpy bandwidth
//!
//! The single-threaded variant times one full-payload copy per round. The
//! multi-threaded variant splits the payload into `threads` contiguous
//! slices (the last slice absorbs the remainder) and times spawn through
//! join. The destination is zero-filled between rounds to defeat copy
//! elision, and the copied payload is verified every round.

use anyhow::bail;
use ipcbench_core::{generate, run_bandwidth, verify, BenchmarkResult, Timer};

/// Single-threaded memcpy.
pub fn run(iterations: u32, warmups: u32, payload_bytes: u64) -> anyhow::Result<BenchmarkResult> {
    let payload_len = payload_bytes as usize;
    let src = generate(payload_len);
    let mut dst = vec![0u8; payload_len];

    run_bandwidth(iterations, warmups, payload_bytes, |i, _| {
        dst.fill(0);

        let timer = Timer::start();
        dst.copy_from_slice(&src);
        let elapsed = timer.elapsed();

        if !verify(&dst, payload_len) {
            bail!("memcpy payload verification failed (iteration {i})");
        }
        Ok(elapsed)
    })
}

/// Multi-threaded memcpy with `threads` workers.
pub fn run_mt(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    threads: u64,
) -> anyhow::Result<BenchmarkResult> {
    anyhow::ensure!(threads > 0, "memcpy_mt needs at least one thread");

    let payload_len = payload_bytes as usize;
    let workers = threads as usize;
    let slice_len = payload_len / workers;

    let src = generate(payload_len);
    let mut dst = vec![0u8; payload_len];

    tracing::debug!(workers, payload_len, "multi-threaded memcpy");

    run_bandwidth(iterations, warmups, payload_bytes, |i, _| {
        dst.fill(0);

        let timer = Timer::start();
        std::thread::scope(|scope| {
            let mut rest: &mut [u8] = &mut dst;
            let mut offset = 0usize;
            for worker in 0..workers {
                let take = if worker == workers - 1 {
                    rest.len()
                } else {
                    slice_len
                };
                let (head, tail) = rest.split_at_mut(take);
                rest = tail;
                let part = &src[offset..offset + take];
                offset += take;
                scope.spawn(move || head.copy_from_slice(part));
            }
        });
        let elapsed = timer.elapsed();

        if !verify(&dst, payload_len) {
            bail!("memcpy_mt payload verification failed (iteration {i})");
        }
        Ok(elapsed)
    })
}
