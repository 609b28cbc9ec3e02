//! Probe harness loops
//!
//! A probe is a closure that runs one *outer iteration* and reports how long
//! its measured region took. The harness runs `warmups + iterations` outer
//! iterations, keeps only the measured ones, and reduces them with trimmed
//! statistics. Warmup and measured iterations are otherwise identical; the
//! closure receives the iteration index for logging.

use ipcbench_stats::{bandwidth_stats, trimmed_stats};
use std::time::Duration;

/// Final result of one probe: mean and standard deviation in the probe's
/// natural unit (seconds per operation for latency, bytes per second for
/// bandwidth).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkResult {
    /// Trimmed mean.
    pub average: f64,
    /// Population standard deviation of the trimmed sample.
    pub stddev: f64,
}

/// Run a latency probe.
///
/// `round` performs one outer iteration (partner setup, the tight loop of
/// single operations, partner teardown) and returns the elapsed time of the
/// tight loop only. `ops_per_round` is `loop_size * k`, where `k` is the
/// number of single operations per loop pass; the per-iteration sample is
/// `elapsed / ops_per_round` seconds.
pub fn run_latency<E, F>(
    iterations: u32,
    warmups: u32,
    ops_per_round: u64,
    mut round: F,
) -> Result<BenchmarkResult, E>
where
    F: FnMut(u32) -> Result<Duration, E>,
{
    assert!(ops_per_round > 0, "ops_per_round must be positive");

    let mut samples = Vec::with_capacity(iterations as usize);
    for i in 0..warmups + iterations {
        tracing::debug!(iteration = i, total = warmups + iterations, "latency round");
        let elapsed = round(i)?;
        if i >= warmups {
            samples.push(elapsed.as_secs_f64() / ops_per_round as f64);
        }
    }

    let stats = trimmed_stats(&samples);
    Ok(BenchmarkResult {
        average: stats.mean,
        stddev: stats.stddev,
    })
}

/// Run a bandwidth probe.
///
/// `round` performs one outer round (resource setup, the timed transfer of
/// `payload_bytes` bytes, verification, resource teardown) and returns the
/// elapsed time of the transfer window. The per-iteration samples are the
/// raw durations; the result is converted to bytes per second.
pub fn run_bandwidth<E, F>(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    mut round: F,
) -> Result<BenchmarkResult, E>
where
    F: FnMut(u32, bool) -> Result<Duration, E>,
{
    let mut durations = Vec::with_capacity(iterations as usize);
    for i in 0..warmups + iterations {
        let is_warmup = i < warmups;
        tracing::debug!(
            iteration = i,
            total = warmups + iterations,
            is_warmup,
            "bandwidth round"
        );
        let elapsed = round(i, is_warmup)?;
        if !is_warmup {
            durations.push(elapsed.as_secs_f64());
        }
    }

    let stats = bandwidth_stats(&durations, payload_bytes);
    Ok(BenchmarkResult {
        average: stats.mean,
        stddev: stats.stddev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn latency_divides_by_ops_per_round() {
        // Every round reports 1 ms over 1000 ops -> 1 us per op.
        let result: Result<_, Infallible> =
            run_latency(3, 0, 1000, |_| Ok(Duration::from_millis(1)));
        let result = result.unwrap();
        assert!((result.average - 1e-6).abs() < 1e-12);
        assert_eq!(result.stddev, 0.0);
    }

    #[test]
    fn latency_skips_warmup_rounds() {
        // Warmup rounds are wildly slow; they must not affect the result.
        let mut calls = 0u32;
        let result: Result<_, Infallible> = run_latency(3, 2, 1, |_| {
            calls += 1;
            if calls <= 2 {
                Ok(Duration::from_secs(10))
            } else {
                Ok(Duration::from_nanos(100))
            }
        });
        let result = result.unwrap();
        assert_eq!(calls, 5);
        assert!((result.average - 100e-9).abs() < 1e-15);
    }

    #[test]
    fn bandwidth_converts_to_bytes_per_second() {
        let payload = 1u64 << 20;
        let result: Result<_, Infallible> =
            run_bandwidth(3, 1, payload, |_, _| Ok(Duration::from_secs(2)));
        let result = result.unwrap();
        assert!((result.average - payload as f64 / 2.0).abs() < 1e-6);
    }

    #[test]
    fn round_errors_propagate() {
        let result: Result<BenchmarkResult, &str> = run_latency(3, 0, 1, |i| {
            if i == 1 { Err("boom") } else { Ok(Duration::from_secs(1)) }
        });
        assert_eq!(result.unwrap_err(), "boom");
    }
}
