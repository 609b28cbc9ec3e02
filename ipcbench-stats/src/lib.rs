#![warn(missing_docs)]
//! ipcbench statistical engine
//!
//! Every probe produces a vector of per-iteration samples; this crate turns
//! such a vector into the reported mean and standard deviation:
//! - samples are sorted and the single best and single worst are discarded
//! - the mean and population standard deviation of the rest are returned
//! - bandwidth probes additionally convert a duration statistic into a
//!   bytes-per-second statistic with first-order error propagation

/// Mean and population standard deviation of a trimmed sample vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    /// Arithmetic mean of the retained samples.
    pub mean: f64,
    /// Population standard deviation of the retained samples.
    pub stddev: f64,
}

/// Compute the trimmed mean and population standard deviation.
///
/// The input is sorted, the single minimum and single maximum are dropped,
/// and the statistics are computed over the remaining `n - 2` values. This
/// guards against one-shot scheduler hiccups without materially biasing the
/// mean.
///
/// # Panics
/// Fewer than 3 samples is a programming error in the calling harness and
/// panics.
pub fn trimmed_stats(samples: &[f64]) -> Stats {
    assert!(
        samples.len() >= 3,
        "trimmed_stats needs at least 3 samples, got {}",
        samples.len()
    );

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let kept = &sorted[1..sorted.len() - 1];

    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    let variance = kept.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / kept.len() as f64;

    Stats {
        mean,
        stddev: variance.sqrt(),
    }
}

/// Convert per-iteration transfer durations (seconds) into a bandwidth
/// statistic in bytes per second.
///
/// The durations are trimmed first, then `mean = payload / mean_duration`
/// and the standard deviation is propagated to first order:
/// `stddev = payload * stddev_duration / mean_duration^2`.
pub fn bandwidth_stats(durations: &[f64], payload_bytes: u64) -> Stats {
    let d = trimmed_stats(durations);
    let payload = payload_bytes as f64;
    Stats {
        mean: payload / d.mean,
        stddev: payload * d.stddev / (d.mean * d.mean),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_min_and_max() {
        // 0.0 and 100.0 are dropped; the rest average to 2.0.
        let samples = vec![1.0, 2.0, 3.0, 0.0, 100.0];
        let stats = trimmed_stats(&samples);
        assert!((stats.mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn stddev_is_population_stddev() {
        // After trimming, [2.0, 4.0] remain: mean 3.0, population stddev 1.0.
        let samples = vec![1.0, 2.0, 4.0, 9.0];
        let stats = trimmed_stats(&samples);
        assert!((stats.mean - 3.0).abs() < 1e-12);
        assert!((stats.stddev - 1.0).abs() < 1e-12);
    }

    #[test]
    fn identical_retained_samples_have_zero_stddev() {
        let samples = vec![5.0, 5.0, 5.0, 5.0, 5.0];
        let stats = trimmed_stats(&samples);
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert_eq!(stats.stddev, 0.0);
    }

    #[test]
    fn exactly_three_samples_keeps_the_median() {
        let stats = trimmed_stats(&[3.0, 1.0, 2.0]);
        assert!((stats.mean - 2.0).abs() < 1e-12);
        assert_eq!(stats.stddev, 0.0);
    }

    #[test]
    #[should_panic(expected = "at least 3 samples")]
    fn too_few_samples_panics() {
        trimmed_stats(&[1.0, 2.0]);
    }

    #[test]
    fn bandwidth_from_durations() {
        // 1 GiB moved in a steady 2 seconds -> 0.5 GiB/s, zero spread.
        let payload = 1u64 << 30;
        let stats = bandwidth_stats(&[2.0, 2.0, 2.0, 2.0], payload);
        assert!((stats.mean - payload as f64 / 2.0).abs() < 1e-6);
        assert_eq!(stats.stddev, 0.0);
    }

    #[test]
    fn bandwidth_error_propagation() {
        // Retained durations [2.0, 4.0]: mean 3.0, stddev 1.0.
        let payload = 900u64;
        let stats = bandwidth_stats(&[1.0, 2.0, 4.0, 10.0], payload);
        assert!((stats.mean - 300.0).abs() < 1e-9);
        assert!((stats.stddev - 100.0).abs() < 1e-9);
    }
}
