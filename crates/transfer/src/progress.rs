use std::collections::VecDeque;
use std::time::Duration;

// ---------------------------------------------------------------------------
// SpeedCalculator
// ---------------------------------------------------------------------------

struct SpeedSample {
    bytes: u64,
    elapsed: Duration,
}

/// Smoothed transfer speed over the last few chunks.
///
/// Each sample is one acknowledged chunk and the wall time it took to get
/// it acknowledged, retries included.
pub struct SpeedCalculator {
    samples: VecDeque<SpeedSample>,
    max_samples: usize,
}

impl Default for SpeedCalculator {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SpeedCalculator {
    /// Creates a new calculator keeping `max_samples` chunks (default 8).
    pub fn new(max_samples: Option<usize>) -> Self {
        let max_samples = max_samples.unwrap_or(8).max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Records one chunk of `bytes` that took `elapsed`.
    pub fn add_sample(&mut self, bytes: u64, elapsed: Duration) {
        self.samples.push_back(SpeedSample { bytes, elapsed });
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Returns the average speed in bytes/second across retained samples.
    ///
    /// Returns 0.0 with no samples or no measurable time.
    pub fn bytes_per_second(&self) -> f64 {
        let total_bytes: u64 = self.samples.iter().map(|s| s.bytes).sum();
        let total_time: Duration = self.samples.iter().map(|s| s.elapsed).sum();
        if total_time.is_zero() {
            return 0.0;
        }
        total_bytes as f64 / total_time.as_secs_f64()
    }

    /// Estimates time remaining to transfer `remaining_bytes`.
    ///
    /// Returns `None` if speed is zero.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let speed = self.bytes_per_second();
        if speed <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(remaining_bytes as f64 / speed))
    }

    /// Clears all recorded samples.
    pub fn reset(&mut self) {
        self.samples.clear();
    }
}
