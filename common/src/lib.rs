//! Shared wire definitions for netdelay
//!
//! This crate provides the constants and payload layout shared by the
//! raw Ethernet ring transport and the datagram transport, so both ends of
//! a measurement agree on sizes and offsets.

#![cfg_attr(not(test), no_std)]

pub mod constants;
pub mod types;

// Re-export commonly used types
pub use constants::*;
pub use types::ProbeTimestamp;
