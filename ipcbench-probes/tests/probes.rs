//! End-to-end probe scenarios
//!
//! Every probe runs with a tiny configuration and must come back with a
//! positive average, a non-negative spread, and no named OS resources left
//! behind.

use ipcbench_ipc::{exit_child, fork, unique_name, Fork, ProcessBarrier};
use ipcbench_probes::{bandwidth, latency};

/// Temp-dir entries whose name starts with `prefix`.
fn temp_entries_with_prefix(prefix: &str) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(entries) = std::fs::read_dir(std::env::temp_dir()) {
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(prefix) {
                names.push(name);
            }
        }
    }
    names.sort();
    names
}

#[test]
fn getpid_latency_scenario() {
    let result = latency::syscall::run_getpid(3, 0, 10).unwrap();
    assert!(result.average > 0.0);
    assert!(result.stddev >= 0.0);
}

#[test]
fn memcpy_bandwidth_scenario() {
    let result = bandwidth::memcpy::run(3, 0, 1024).unwrap();
    assert!(result.average > 0.0);
    assert!(result.stddev >= 0.0);
}

#[test]
fn pipe_bandwidth_scenario() {
    let result = bandwidth::pipe::run(3, 0, 1024, 1024).unwrap();
    assert!(result.average > 0.0);
}

#[test]
fn uds_bandwidth_scenario() {
    let before = temp_entries_with_prefix("ipcbench_uds_");
    let result = bandwidth::uds::run(3, 0, 256, 256).unwrap();
    assert!(result.average > 0.0);

    // The socket path carries a fresh random suffix; nothing new may be
    // left under the temp directory.
    let after = temp_entries_with_prefix("ipcbench_uds_");
    assert_eq!(before, after, "socket path left behind");
}

#[test]
fn fifo_bandwidth_scenario() {
    let before = temp_entries_with_prefix("ipcbench_fifo_");
    let result = bandwidth::fifo::run(3, 0, 4096, 1024).unwrap();
    assert!(result.average > 0.0);

    let after = temp_entries_with_prefix("ipcbench_fifo_");
    assert_eq!(before, after, "fifo node left behind");
}

#[test]
fn mq_bandwidth_scenario() {
    let result = bandwidth::mq::run(3, 0, 4096, 1024).unwrap();
    assert!(result.average > 0.0);
}

#[test]
fn tcp_bandwidth_scenario() {
    let result = bandwidth::tcp::run(3, 0, 8192, 4096).unwrap();
    assert!(result.average > 0.0);
}

#[test]
fn mmap_bandwidth_scenario() {
    let before = temp_entries_with_prefix("ipcbench_mmap_");
    let result = bandwidth::shared::run_mmap(3, 0, 4096, 1024).unwrap();
    assert!(result.average > 0.0);

    let after = temp_entries_with_prefix("ipcbench_mmap_");
    assert_eq!(before, after, "mapped file left behind");
}

#[test]
fn shm_bandwidth_scenario() {
    let result = bandwidth::shared::run_shm(3, 0, 4096, 1024).unwrap();
    assert!(result.average > 0.0);
}

#[test]
fn atomic_seq_cst_latency_scenario() {
    let result = latency::atomic::run_seq_cst(3, 0, 10).unwrap();
    assert!(result.average > 0.0);
    assert!(result.stddev >= 0.0);
}

#[test]
fn condition_variable_latency_scenario() {
    let result = latency::condvar::run(3, 0, 10).unwrap();
    assert!(result.average > 0.0);
}

#[test]
fn semaphore_latency_scenario() {
    let result = latency::semaphore::run(3, 0, 10).unwrap();
    assert!(result.average > 0.0);
}

#[test]
fn barrier_latency_scenario() {
    let result = latency::barrier::run(3, 0, 10).unwrap();
    assert!(result.average > 0.0);
    assert!(result.stddev >= 0.0);
}

// Barrier reusability across a real process boundary: parent and child each
// construct under the same id, wait k times, and the named resources are
// gone once both participants have left.
#[test]
fn barrier_is_reusable_across_fork() {
    let id = unique_name("/ipcbench_fork_barrier_test");
    ProcessBarrier::clear(&id);
    let rounds = 20u64;

    match fork().unwrap() {
        Fork::Child => {
            let code = (|| -> Result<(), ipcbench_ipc::IpcError> {
                let mut barrier = ProcessBarrier::new(&id, 2)?;
                for _ in 0..rounds {
                    barrier.wait()?;
                }
                Ok(())
            })()
            .map(|_| 0)
            .unwrap_or(1);
            exit_child(code)
        }
        Fork::Parent(child) => {
            let mut barrier = ProcessBarrier::new(&id, 2).unwrap();
            for _ in 0..rounds {
                barrier.wait().unwrap();
            }
            drop(barrier);
            child.wait().unwrap();
            assert!(
                !ProcessBarrier::resources_exist(&id),
                "barrier resources survived the last participant"
            );
        }
    }
}
