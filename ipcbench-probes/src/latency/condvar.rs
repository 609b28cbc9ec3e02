//! Condition-variable ping-pong latency between two threads
//!
//! Two flags, each guarded by its own mutex and condition variable. One
//! loop pass is one notify from each side, so `k = 2`.

use anyhow::anyhow;
use ipcbench_core::{run_latency, BenchmarkResult, Timer};
use std::sync::{Condvar, Mutex};

/// Single operations per loop pass: one wake in each direction.
const OPS_PER_PASS: u64 = 2;

struct Flag {
    ready: Mutex<bool>,
    cv: Condvar,
}

impl Flag {
    fn new() -> Self {
        Self {
            ready: Mutex::new(false),
            cv: Condvar::new(),
        }
    }

    fn raise(&self) {
        *self.ready.lock().unwrap() = true;
        self.cv.notify_one();
    }

    fn consume(&self) {
        let mut ready = self.ready.lock().unwrap();
        while !*ready {
            ready = self.cv.wait(ready).unwrap();
        }
        *ready = false;
    }
}

fn parent_flip(parent: &Flag, child: &Flag, loop_size: u64) {
    for _ in 0..loop_size {
        parent.raise();
        child.consume();
    }
}

fn child_flip(parent: &Flag, child: &Flag, loop_size: u64) {
    for _ in 0..loop_size {
        parent.consume();
        child.raise();
    }
}

/// Condition-variable ping-pong.
pub fn run(iterations: u32, warmups: u32, loop_size: u64) -> anyhow::Result<BenchmarkResult> {
    run_latency(iterations, warmups, loop_size * OPS_PER_PASS, |_| {
        // Fresh flags per outer iteration; both start lowered.
        let parent = Flag::new();
        let child = Flag::new();

        std::thread::scope(|scope| {
            let partner = scope.spawn(|| child_flip(&parent, &child, loop_size));

            let timer = Timer::start();
            parent_flip(&parent, &child, loop_size);
            let elapsed = timer.elapsed();

            partner
                .join()
                .map_err(|_| anyhow!("ping-pong partner thread panicked"))?;
            Ok(elapsed)
        })
    })
}
