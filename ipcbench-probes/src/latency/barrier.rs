//! Cross-process barrier round latency
//!
//! Uses the sense-reversing barrier itself as the operation under test:
//! parent and child each call `wait()` `loop_size` times and the parent's
//! loop is timed. One loop pass is one barrier round, so `k = 1`.

use ipcbench_core::{run_latency, BenchmarkResult, Timer};
use ipcbench_ipc::{exit_child, fork, unique_name, Fork, ProcessBarrier};

const PARTICIPANTS: u64 = 2;

fn child_rounds(id: &str, loop_size: u64) -> anyhow::Result<()> {
    let mut barrier = ProcessBarrier::new(id, PARTICIPANTS)?;
    for _ in 0..loop_size {
        barrier.wait()?;
    }
    Ok(())
}

/// Barrier round-trip latency between two processes.
pub fn run(iterations: u32, warmups: u32, loop_size: u64) -> anyhow::Result<BenchmarkResult> {
    let id = unique_name("/ipcbench_barrier_latency");
    ProcessBarrier::clear(&id);

    let result = run_latency(iterations, warmups, loop_size, |_| {
        // Fresh barrier per outer iteration; both sides construct under the
        // same id and rendezvous in the constructor.
        match fork()? {
            Fork::Child => {
                let code = match child_rounds(&id, loop_size) {
                    Ok(()) => 0,
                    Err(e) => {
                        tracing::error!(error = %e, "barrier latency child failed");
                        1
                    }
                };
                exit_child(code)
            }
            Fork::Parent(child) => {
                let outcome = (|| {
                    let mut barrier = ProcessBarrier::new(&id, PARTICIPANTS)?;

                    let timer = Timer::start();
                    for _ in 0..loop_size {
                        barrier.wait()?;
                    }
                    let elapsed = timer.elapsed();

                    drop(barrier);
                    Ok(elapsed)
                })();
                child.finish(outcome)
            }
        }
    });

    ProcessBarrier::clear(&id);
    result
}
