//! Initiator measurement session
//!
//! Owns the per-run state both initiators share: the clock, the warm-up
//! counter, the latency window and the exporter. A transport hands it the
//! timestamp echoed back and the time the echo arrived; the session decides
//! whether the sample is kept.

use crate::{
    clock::{self, Clock},
    exporter::{AggregateLine, SampleExporter},
    window::{Aggregate, LatencyWindow, WarmUp, WindowMode},
};
use anyhow::{Context, Result};
use log::{debug, warn};
use netdelay_common::ProbeTimestamp;

/// Fate of one echoed timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Valid, consumed by the warm-up
    WarmUp,
    /// Valid and aggregated
    Accepted { nanos: u64 },
    /// Valid, aggregated, and completed an aggregate line
    Emitted { nanos: u64, aggregate: Aggregate },
    /// A whole second or more old, so presumed corrupted
    Stale,
}

/// Why an iteration produced no sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// No transmit slot free
    QueueFull,
    /// The probe could not be handed to the network
    SendFailed,
    /// No echo within the timeout
    Timeout,
    /// Woken without an echo to read
    NoData,
    /// A signal cut the wait short
    Interrupted,
    /// The echo was too short or the wrong size
    Malformed,
}

/// Result of one send/await/measure iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Measured(Verdict),
    Skipped(Skip),
}

/// Per-run measurement state of an initiator
pub struct Session<C: Clock> {
    clock: C,
    warmup: WarmUp,
    window: LatencyWindow,
    exporter: Box<dyn SampleExporter>,
    timestamps: bool,
}

impl<C: Clock> Session<C> {
    /// Create a session
    ///
    /// # Arguments
    ///
    /// * `clock` - Time source for probes and line prefixes
    /// * `exporter` - Destination of aggregate lines
    /// * `mode` - Whether the window resets after each line
    /// * `timestamps` - Prefix lines with the wall-clock time
    pub fn new(clock: C, exporter: Box<dyn SampleExporter>, mode: WindowMode, timestamps: bool) -> Self {
        Self {
            clock,
            warmup: WarmUp::default(),
            window: LatencyWindow::new(mode),
            exporter,
            timestamps,
        }
    }

    /// Current monotonic time
    pub fn now(&self) -> ProbeTimestamp {
        self.clock.monotonic()
    }

    pub fn window(&self) -> &LatencyWindow {
        &self.window
    }

    #[cfg(test)]
    pub(crate) fn clock(&self) -> &C {
        &self.clock
    }

    /// Account for one echo
    ///
    /// Errors are fatal: a clock regression, or an aggregate that could not
    /// be written.
    pub fn record(&mut self, sent: ProbeTimestamp, received: ProbeTimestamp) -> Result<Verdict> {
        let elapsed = clock::elapsed(sent, received).context("Clock regression, aborting")?;

        if elapsed.sec != 0 {
            warn!("Stale echo skipped ({}.{:09}s old)", elapsed.sec, elapsed.nsec);
            return Ok(Verdict::Stale);
        }
        let nanos = elapsed.as_nanos();

        if self.warmup.absorb() {
            debug!("Warm-up sample {} ns", nanos);
            return Ok(Verdict::WarmUp);
        }
        debug!("Sample {} ns", nanos);

        match self.window.add(nanos) {
            Some(aggregate) => {
                let line = AggregateLine {
                    timestamp: self
                        .timestamps
                        .then(|| clock::format_wall(&self.clock.wall())),
                    aggregate,
                };
                self.exporter.export(&line)?;
                Ok(Verdict::Emitted { nanos, aggregate })
            }
            None => Ok(Verdict::Accepted { nanos }),
        }
    }
}
