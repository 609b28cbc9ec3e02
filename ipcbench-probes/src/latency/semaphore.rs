//! Named-semaphore ping-pong latency between two processes
//!
//! Two named semaphores, one owned by each direction. A loop pass is one
//! post plus one wait on each side, so `k = 2`. Both semaphores are created
//! before the fork and opened from both sides afterwards.

use anyhow::Context;
use ipcbench_core::{run_latency, BenchmarkResult, Timer};
use ipcbench_ipc::{exit_child, fork, unique_name, Fork, NamedSemaphore};

/// Single operations per loop pass: one post + one wait per half.
const OPS_PER_PASS: u64 = 2;

fn parent_process(
    parent_name: &str,
    child_name: &str,
    iterations: u32,
    warmups: u32,
    loop_size: u64,
) -> anyhow::Result<BenchmarkResult> {
    let parent_sem = NamedSemaphore::open(parent_name).context("open parent semaphore")?;
    let child_sem = NamedSemaphore::open(child_name).context("open child semaphore")?;

    run_latency(iterations, warmups, loop_size * OPS_PER_PASS, |_| {
        let timer = Timer::start();
        for _ in 0..loop_size {
            child_sem.post()?;
            parent_sem.wait()?;
        }
        Ok(timer.elapsed())
    })
}

fn child_process(
    parent_name: &str,
    child_name: &str,
    total_iterations: u32,
    loop_size: u64,
) -> anyhow::Result<()> {
    let parent_sem = NamedSemaphore::open(parent_name).context("open parent semaphore")?;
    let child_sem = NamedSemaphore::open(child_name).context("open child semaphore")?;

    for i in 0..total_iterations {
        tracing::debug!(iteration = i, total_iterations, "child ping-pong round");
        for _ in 0..loop_size {
            child_sem.wait()?;
            parent_sem.post()?;
        }
    }
    Ok(())
}

/// Named-semaphore ping-pong.
pub fn run(iterations: u32, warmups: u32, loop_size: u64) -> anyhow::Result<BenchmarkResult> {
    let parent_name = unique_name("/ipcbench_sem_latency_parent");
    let child_name = unique_name("/ipcbench_sem_latency_child");
    NamedSemaphore::unlink(&parent_name);
    NamedSemaphore::unlink(&child_name);

    // Create both before forking so neither side races the other's open.
    drop(NamedSemaphore::create(&parent_name, 0)?);
    drop(NamedSemaphore::create(&child_name, 0)?);

    match fork()? {
        Fork::Child => {
            let code = match child_process(
                &parent_name,
                &child_name,
                iterations + warmups,
                loop_size,
            ) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!(error = %e, "semaphore ping-pong child failed");
                    1
                }
            };
            exit_child(code)
        }
        Fork::Parent(child) => {
            let result = parent_process(&parent_name, &child_name, iterations, warmups, loop_size);
            let result = child.finish(result);
            NamedSemaphore::unlink(&parent_name);
            NamedSemaphore::unlink(&child_name);
            result
        }
    }
}
