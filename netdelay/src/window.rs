//! Latency aggregation
//!
//! Accepted samples first pass a warm-up filter, then feed a window of
//! `{count, sum, min, max}` that yields one aggregate every
//! `EMIT_INTERVAL` samples.

use netdelay_common::{EMIT_INTERVAL, WARMUP_SAMPLES};
use serde::Serialize;

/// Discards the first samples of a run
#[derive(Debug, Clone)]
pub struct WarmUp {
    remaining: u32,
}

impl Default for WarmUp {
    fn default() -> Self {
        Self::new(WARMUP_SAMPLES)
    }
}

impl WarmUp {
    pub fn new(samples: u32) -> Self {
        Self { remaining: samples }
    }

    /// Consume one sample; true while the sample belongs to the warm-up
    pub fn absorb(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// What happens to the accumulator after an aggregate is emitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    /// Start a fresh window: each line covers the last `EMIT_INTERVAL` samples
    #[default]
    Reset,
    /// Keep accumulating: each line covers the whole run so far
    Cumulative,
}

/// One emitted aggregate, in nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub min_ns: u64,
    pub avg_ns: u64,
    pub max_ns: u64,
    /// Samples the aggregate covers
    pub samples: u64,
}

/// Running aggregate of accepted samples
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    mode: WindowMode,
    count: u64,
    sum: u64,
    min: u64,
    max: u64,
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(WindowMode::default())
    }
}

impl LatencyWindow {
    pub fn new(mode: WindowMode) -> Self {
        Self {
            mode,
            count: 0,
            sum: 0,
            min: u64::MAX,
            max: 0,
        }
    }

    /// Add one sample, returning an aggregate on every `EMIT_INTERVAL`th
    pub fn add(&mut self, nanos: u64) -> Option<Aggregate> {
        self.count += 1;
        self.sum = self.sum.saturating_add(nanos);
        self.min = self.min.min(nanos);
        self.max = self.max.max(nanos);

        if self.count % EMIT_INTERVAL != 0 {
            return None;
        }

        let aggregate = Aggregate {
            min_ns: self.min,
            avg_ns: self.sum / self.count,
            max_ns: self.max,
            samples: self.count,
        };
        if self.mode == WindowMode::Reset {
            *self = Self::new(self.mode);
        }
        Some(aggregate)
    }

    /// Samples accumulated since the window began
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> u64 {
        self.sum
    }

    /// Smallest sample, if any
    pub fn min(&self) -> Option<u64> {
        (self.count > 0).then_some(self.min)
    }

    /// Largest sample, if any
    pub fn max(&self) -> Option<u64> {
        (self.count > 0).then_some(self.max)
    }
}
