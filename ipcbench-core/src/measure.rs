//! Monotonic timing
//!
//! All probes time their measured regions with the same monotonic
//! high-resolution clock. Timestamps are taken as close as possible to the
//! operation boundary; conversion to floating-point seconds happens only
//! after the region ends.

use std::time::{Duration, Instant};

/// Timer for one measured region.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Elapsed time since the timer started.
    #[inline(always)]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time in seconds as a real number.
    #[inline(always)]
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_elapsed() {
        let timer = Timer::start();
        std::thread::sleep(Duration::from_millis(10));
        let elapsed = timer.elapsed();

        // Should be at least 5ms, well under 100ms even on a loaded host
        assert!(elapsed >= Duration::from_millis(5));
        assert!(elapsed < Duration::from_millis(100));
    }

    #[test]
    fn test_timer_is_monotone() {
        let timer = Timer::start();
        let a = timer.elapsed_secs();
        let b = timer.elapsed_secs();
        assert!(b >= a);
    }
}
