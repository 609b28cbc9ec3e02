//! Probe dispatch
//!
//! Runs the selected probe(s) against a validated [`RunPlan`] and collects
//! [`ProbeRecord`]s. Aggregate selections keep going when a probe fails and
//! record the failure; the caller decides the exit code.

use crate::registry::{BandwidthProbe, LatencyProbe, Selection};
use ipcbench_core::BenchmarkResult;
use ipcbench_probes::{bandwidth, latency};
use ipcbench_report::{ProbeRecord, Unit};

/// Validated per-run configuration.
#[derive(Debug, Clone, Copy)]
pub struct RunPlan {
    /// Measured outer iterations.
    pub iterations: u32,
    /// Warmup outer iterations.
    pub warmups: u32,
    /// Inner-loop override for latency probes.
    pub loop_size: Option<u64>,
    /// Payload size for bandwidth probes.
    pub payload_bytes: u64,
    /// Chunk size for streaming and shared-buffer probes.
    pub chunk_bytes: u64,
    /// Worker count for the multi-threaded memcpy probe.
    pub threads: Option<u64>,
}

fn run_latency_probe(probe: LatencyProbe, plan: &RunPlan) -> anyhow::Result<BenchmarkResult> {
    let loop_size = plan.loop_size.unwrap_or_else(|| probe.default_loop_size());
    tracing::debug!(probe = probe.name(), loop_size, "running latency probe");

    match probe {
        LatencyProbe::Atomic => latency::atomic::run_seq_cst(plan.iterations, plan.warmups, loop_size),
        LatencyProbe::AtomicRelAcq => {
            latency::atomic::run_rel_acq(plan.iterations, plan.warmups, loop_size)
        }
        LatencyProbe::Barrier => latency::barrier::run(plan.iterations, plan.warmups, loop_size),
        LatencyProbe::ConditionVariable => {
            latency::condvar::run(plan.iterations, plan.warmups, loop_size)
        }
        LatencyProbe::Semaphore => {
            latency::semaphore::run(plan.iterations, plan.warmups, loop_size)
        }
        LatencyProbe::Statfs => latency::syscall::run_statfs(plan.iterations, plan.warmups, loop_size),
        LatencyProbe::Fstatfs => {
            latency::syscall::run_fstatfs(plan.iterations, plan.warmups, loop_size)
        }
        LatencyProbe::Getpid => latency::syscall::run_getpid(plan.iterations, plan.warmups, loop_size),
    }
}

fn latency_record(probe: LatencyProbe, plan: &RunPlan) -> ProbeRecord {
    match run_latency_probe(probe, plan) {
        Ok(result) => ProbeRecord::ok(probe.name(), Unit::Seconds, result),
        Err(e) => {
            tracing::error!(probe = probe.name(), error = %format!("{e:#}"), "probe failed");
            ProbeRecord::failed(probe.name(), Unit::Seconds, format!("{e:#}"))
        }
    }
}

fn bandwidth_record(
    name: String,
    outcome: anyhow::Result<BenchmarkResult>,
) -> ProbeRecord {
    match outcome {
        Ok(result) => ProbeRecord::ok(name, Unit::BytesPerSec, result),
        Err(e) => {
            tracing::error!(probe = %name, error = %format!("{e:#}"), "probe failed");
            ProbeRecord::failed(name, Unit::BytesPerSec, format!("{e:#}"))
        }
    }
}

/// Run one bandwidth probe. The multi-threaded memcpy probe expands to a
/// 1..=4 worker sweep when no explicit thread count was given.
fn run_bandwidth_probe(probe: BandwidthProbe, plan: &RunPlan) -> Vec<ProbeRecord> {
    let (iterations, warmups) = (plan.iterations, plan.warmups);
    let payload = plan.payload_bytes;
    let chunk = plan.chunk_bytes;
    tracing::debug!(probe = probe.name(), payload, chunk, "running bandwidth probe");

    match probe {
        BandwidthProbe::Memcpy => vec![bandwidth_record(
            probe.name().to_string(),
            bandwidth::memcpy::run(iterations, warmups, payload),
        )],
        BandwidthProbe::MemcpyMt => match plan.threads {
            Some(threads) => vec![bandwidth_record(
                probe.name().to_string(),
                bandwidth::memcpy::run_mt(iterations, warmups, payload, threads),
            )],
            None => (1..=4)
                .map(|threads| {
                    bandwidth_record(
                        format!("{} ({} threads)", probe.name(), threads),
                        bandwidth::memcpy::run_mt(iterations, warmups, payload, threads),
                    )
                })
                .collect(),
        },
        BandwidthProbe::Tcp => vec![bandwidth_record(
            probe.name().to_string(),
            bandwidth::tcp::run(iterations, warmups, payload, chunk),
        )],
        BandwidthProbe::Uds => vec![bandwidth_record(
            probe.name().to_string(),
            bandwidth::uds::run(iterations, warmups, payload, chunk),
        )],
        BandwidthProbe::Pipe => vec![bandwidth_record(
            probe.name().to_string(),
            bandwidth::pipe::run(iterations, warmups, payload, chunk),
        )],
        BandwidthProbe::Fifo => vec![bandwidth_record(
            probe.name().to_string(),
            bandwidth::fifo::run(iterations, warmups, payload, chunk),
        )],
        BandwidthProbe::Mq => vec![bandwidth_record(
            probe.name().to_string(),
            bandwidth::mq::run(iterations, warmups, payload, chunk),
        )],
        BandwidthProbe::Mmap => vec![bandwidth_record(
            probe.name().to_string(),
            bandwidth::shared::run_mmap(iterations, warmups, payload, chunk),
        )],
        BandwidthProbe::Shm => vec![bandwidth_record(
            probe.name().to_string(),
            bandwidth::shared::run_shm(iterations, warmups, payload, chunk),
        )],
    }
}

/// Run everything the selection names and collect the records.
pub fn run_selection(selection: Selection, plan: &RunPlan) -> Vec<ProbeRecord> {
    match selection {
        Selection::Latency(probe) => vec![latency_record(probe, plan)],
        Selection::Bandwidth(probe) => run_bandwidth_probe(probe, plan),
        Selection::LatencyAll => LatencyProbe::ALL
            .iter()
            .map(|&probe| latency_record(probe, plan))
            .collect(),
        Selection::BandwidthAll => BandwidthProbe::ALL
            .iter()
            .flat_map(|&probe| run_bandwidth_probe(probe, plan))
            .collect(),
        Selection::All => {
            let mut records = run_selection(Selection::LatencyAll, plan);
            records.extend(run_selection(Selection::BandwidthAll, plan));
            records
        }
    }
}
