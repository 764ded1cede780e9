//! netdelay
//!
//! Measures network round-trip latency between an initiator and a
//! responder. Probes travel either as raw Ethernet frames through
//! memory-mapped packet rings, bypassing the kernel network stack, or as UDP
//! and UDP-Lite datagrams.

pub mod clock;
pub mod config;
pub mod datagram;
pub mod exporter;
pub mod frame;
pub mod l2;
pub mod net;
pub mod ring;
pub mod session;
pub mod setup;
pub mod shutdown;
pub mod sys;
pub mod window;

pub use clock::{Clock, SystemClock};
pub use config::{Plan, Role, RunConfig, Transport};
pub use exporter::{ExporterType, SampleExporter};
pub use session::Session;
pub use shutdown::Shutdown;
pub use window::WindowMode;
