//! Atomic flag-flip latency between two threads
//!
//! Parent and child toggle a pair of booleans in lockstep; one loop pass is
//! four stores (parent up, child up, parent down, child down), so `k = 4`.
//! Two orderings are measured: fully sequentially consistent, and release
//! stores paired with acquire loads.

use anyhow::anyhow;
use ipcbench_core::{run_latency, BenchmarkResult, Timer};
use std::sync::atomic::{AtomicBool, Ordering};

/// Single operations per loop pass: four flag stores per round trip.
const OPS_PER_PASS: u64 = 4;

fn parent_flip_seq_cst(parent: &AtomicBool, child: &AtomicBool, loop_size: u64) {
    for _ in 0..loop_size {
        parent.store(true, Ordering::SeqCst);
        while !child.load(Ordering::SeqCst) {}
        parent.store(false, Ordering::SeqCst);
        while child.load(Ordering::SeqCst) {}
    }
}

fn child_flip_seq_cst(child: &AtomicBool, parent: &AtomicBool, loop_size: u64) {
    for _ in 0..loop_size {
        while !parent.load(Ordering::SeqCst) {}
        child.store(true, Ordering::SeqCst);
        while parent.load(Ordering::SeqCst) {}
        child.store(false, Ordering::SeqCst);
    }
}

// Release on every store so each flip publishes to the partner's acquire
// load; relaxed stores can spin forever on weakly ordered targets.
fn parent_flip_rel_acq(parent: &AtomicBool, child: &AtomicBool, loop_size: u64) {
    for _ in 0..loop_size {
        parent.store(true, Ordering::Release);
        while !child.load(Ordering::Acquire) {}
        parent.store(false, Ordering::Release);
        while child.load(Ordering::Acquire) {}
    }
}

fn child_flip_rel_acq(child: &AtomicBool, parent: &AtomicBool, loop_size: u64) {
    for _ in 0..loop_size {
        while !parent.load(Ordering::Acquire) {}
        child.store(true, Ordering::Release);
        while parent.load(Ordering::Acquire) {}
        child.store(false, Ordering::Release);
    }
}

fn run_flip(
    iterations: u32,
    warmups: u32,
    loop_size: u64,
    parent_flip: fn(&AtomicBool, &AtomicBool, u64),
    child_flip: fn(&AtomicBool, &AtomicBool, u64),
) -> anyhow::Result<BenchmarkResult> {
    let parent = AtomicBool::new(false);
    let child = AtomicBool::new(false);

    run_latency(iterations, warmups, loop_size * OPS_PER_PASS, |_| {
        std::thread::scope(|scope| {
            let partner = scope.spawn(|| child_flip(&child, &parent, loop_size));

            let timer = Timer::start();
            parent_flip(&parent, &child, loop_size);
            let elapsed = timer.elapsed();

            partner
                .join()
                .map_err(|_| anyhow!("flip partner thread panicked"))?;
            Ok(elapsed)
        })
    })
}

/// Sequentially consistent flag flip.
pub fn run_seq_cst(
    iterations: u32,
    warmups: u32,
    loop_size: u64,
) -> anyhow::Result<BenchmarkResult> {
    run_flip(
        iterations,
        warmups,
        loop_size,
        parent_flip_seq_cst,
        child_flip_seq_cst,
    )
}

/// Release/acquire flag flip.
pub fn run_rel_acq(
    iterations: u32,
    warmups: u32,
    loop_size: u64,
) -> anyhow::Result<BenchmarkResult> {
    run_flip(
        iterations,
        warmups,
        loop_size,
        parent_flip_rel_acq,
        child_flip_rel_acq,
    )
}
