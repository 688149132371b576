//! Throughput-driven chunk sizing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::TransferError;

/// Chunk sizing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSizing {
    /// Size of the first chunk, in KiB.
    #[serde(default = "default_initial_kb")]
    pub initial_kb: f64,

    /// Lower bound for adaptive sizing, in KiB.
    #[serde(default = "default_min_kb")]
    pub min_kb: f64,

    /// Upper bound for adaptive sizing, in KiB.
    #[serde(default = "default_max_kb")]
    pub max_kb: f64,

    /// Time each chunk request should take.
    #[serde(default = "default_target_secs")]
    pub target_secs: f64,

    /// Adapt the size after every chunk.
    #[serde(default = "default_true")]
    pub adaptive: bool,
}

fn default_initial_kb() -> f64 {
    5.0 * 1024.0
}

fn default_min_kb() -> f64 {
    1024.0
}

fn default_max_kb() -> f64 {
    50.0 * 1024.0
}

fn default_target_secs() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

impl Default for ChunkSizing {
    fn default() -> Self {
        Self {
            initial_kb: default_initial_kb(),
            min_kb: default_min_kb(),
            max_kb: default_max_kb(),
            target_secs: default_target_secs(),
            adaptive: default_true(),
        }
    }
}

impl ChunkSizing {
    /// Non-adaptive sizing with every chunk `size_kb` KiB.
    pub fn fixed(size_kb: f64) -> Self {
        Self {
            initial_kb: size_kb,
            adaptive: false,
            ..Self::default()
        }
    }

    /// Checks the bounds are usable.
    pub fn validate(&self) -> Result<(), TransferError> {
        for (name, value) in [
            ("initial_kb", self.initial_kb),
            ("min_kb", self.min_kb),
            ("max_kb", self.max_kb),
            ("target_secs", self.target_secs),
        ] {
            if !value.is_finite() {
                return Err(TransferError::InvalidSizing(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if !(self.initial_kb > 0.0) {
            return Err(TransferError::InvalidSizing(format!(
                "initial_kb must be positive, got {}",
                self.initial_kb
            )));
        }
        if self.adaptive {
            if !(self.min_kb > 0.0) {
                return Err(TransferError::InvalidSizing(format!(
                    "min_kb must be positive, got {}",
                    self.min_kb
                )));
            }
            if self.min_kb > self.max_kb {
                return Err(TransferError::InvalidSizing(format!(
                    "min_kb {} exceeds max_kb {}",
                    self.min_kb, self.max_kb
                )));
            }
            if !(self.target_secs > 0.0) {
                return Err(TransferError::InvalidSizing(format!(
                    "target_secs must be positive, got {}",
                    self.target_secs
                )));
            }
        }
        Ok(())
    }
}

/// Steers the chunk size toward `target_secs` per request.
///
/// Each step averages the current size with the size that would have hit
/// the target at the measured speed, then clamps into `[min_kb, max_kb]`.
#[derive(Debug, Clone)]
pub struct ChunkSizeController {
    current_kb: f64,
    min_kb: f64,
    max_kb: f64,
    target_secs: f64,
    adaptive: bool,
}

impl ChunkSizeController {
    pub fn new(sizing: &ChunkSizing) -> Self {
        let current_kb = if sizing.adaptive {
            sizing.initial_kb.clamp(sizing.min_kb, sizing.max_kb)
        } else {
            sizing.initial_kb
        };
        Self {
            current_kb,
            min_kb: sizing.min_kb,
            max_kb: sizing.max_kb,
            target_secs: sizing.target_secs,
            adaptive: sizing.adaptive,
        }
    }

    /// Feeds the timing of one acknowledged chunk.
    ///
    /// No-op when adaptive sizing is off or `elapsed` is zero.
    pub fn adjust(&mut self, elapsed: Duration, bytes_sent: usize) {
        let elapsed_secs = elapsed.as_secs_f64();
        if !self.adaptive || elapsed_secs <= 0.0 {
            return;
        }

        let speed_kbps = (bytes_sent as f64 / 1024.0) / elapsed_secs;
        let ideal_kb = speed_kbps * self.target_secs;
        let next_kb = ((self.current_kb + ideal_kb) / 2.0).clamp(self.min_kb, self.max_kb);

        trace!(
            speed_kbps = format_args!("{speed_kbps:.1}"),
            from_kb = format_args!("{:.1}", self.current_kb),
            to_kb = format_args!("{next_kb:.1}"),
            "chunk size adjusted"
        );
        self.current_kb = next_kb;
    }

    /// Current size in KiB.
    pub fn current_kb(&self) -> f64 {
        self.current_kb
    }

    /// Byte size of the next read.
    pub fn chunk_bytes(&self) -> usize {
        ((self.current_kb * 1024.0).round() as usize).max(1)
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn bounds_kb(&self) -> (f64, f64) {
        (self.min_kb, self.max_kb)
    }
}
