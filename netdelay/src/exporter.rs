//! Aggregate line exporters
//!
//! Provides the output formats for emitted aggregates (plain columns, JSON
//! lines). Each line is flushed as soon as it is written.

use crate::window::Aggregate;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

/// Trait for aggregate exporters
pub trait SampleExporter {
    /// Export one aggregate
    ///
    /// # Arguments
    ///
    /// * `line` - Aggregate with its optional wall-clock prefix
    ///
    /// # Returns
    ///
    /// Result indicating success or failure
    fn export(&mut self, line: &AggregateLine) -> Result<()>;
}

/// Export format type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExporterType {
    /// `[HH:MM:SS.nnnnnnnnn ]min avg max`
    #[default]
    Plain,
    /// One JSON object per line
    Json,
}

/// An aggregate ready for output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateLine {
    /// Wall-clock time of emission, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub aggregate: Aggregate,
}

/// Plain column exporter
pub struct PlainExporter<W: Write> {
    out: W,
}

impl<W: Write> PlainExporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Format one line without the trailing newline
    fn to_plain_format(line: &AggregateLine) -> String {
        let a = &line.aggregate;
        match &line.timestamp {
            Some(ts) => format!("{} {} {} {}", ts, a.min_ns, a.avg_ns, a.max_ns),
            None => format!("{} {} {}", a.min_ns, a.avg_ns, a.max_ns),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SampleExporter for PlainExporter<W> {
    fn export(&mut self, line: &AggregateLine) -> Result<()> {
        writeln!(self.out, "{}", Self::to_plain_format(line)).context("Failed to write aggregate line")?;
        self.out.flush().context("Failed to flush aggregate line")?;
        Ok(())
    }
}

/// JSON lines exporter
pub struct JsonExporter<W: Write> {
    out: W,
}

impl<W: Write> JsonExporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SampleExporter for JsonExporter<W> {
    fn export(&mut self, line: &AggregateLine) -> Result<()> {
        let json = serde_json::to_string(line)?;
        writeln!(self.out, "{}", json).context("Failed to write aggregate line")?;
        self.out.flush().context("Failed to flush aggregate line")?;
        Ok(())
    }
}

/// Build the exporter for `kind` writing to `out`
pub fn exporter_for<W: Write + 'static>(kind: ExporterType, out: W) -> Box<dyn SampleExporter> {
    match kind {
        ExporterType::Plain => Box::new(PlainExporter::new(out)),
        ExporterType::Json => Box::new(JsonExporter::new(out)),
    }
}
