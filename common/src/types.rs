//! Probe payload layout
//!
//! The payload header must be repr(C) so both ends, running the same
//! build, interpret the timestamp bytes identically.

use crate::constants::{DATA_SIZE, NSEC_PER_SEC, TIMESTAMP_SIZE};

/// Monotonic timestamp carried in the first bytes of every probe
///
/// Native byte order; both ends run the same implementation.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProbeTimestamp {
    /// Whole seconds
    pub sec: i64,
    /// Nanoseconds, `0..NSEC_PER_SEC` when normalized
    pub nsec: i64,
}

impl ProbeTimestamp {
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Serialize into the leading bytes of a probe payload
    pub fn write_to(&self, buf: &mut [u8]) {
        buf[0..8].copy_from_slice(&self.sec.to_ne_bytes());
        buf[8..16].copy_from_slice(&self.nsec.to_ne_bytes());
    }

    /// Read from the leading bytes of a probe payload
    pub fn read_from(buf: &[u8]) -> Self {
        let mut sec = [0u8; 8];
        let mut nsec = [0u8; 8];
        sec.copy_from_slice(&buf[0..8]);
        nsec.copy_from_slice(&buf[8..16]);
        Self {
            sec: i64::from_ne_bytes(sec),
            nsec: i64::from_ne_bytes(nsec),
        }
    }

    /// Total nanoseconds, saturating on overflow
    pub fn as_nanos(&self) -> u64 {
        (self.sec as i128 * NSEC_PER_SEC as i128 + self.nsec as i128)
            .clamp(0, u64::MAX as i128) as u64
    }
}

// Compile-time layout checks
const _: () = {
    assert!(core::mem::size_of::<ProbeTimestamp>() == TIMESTAMP_SIZE);
    assert!(TIMESTAMP_SIZE <= DATA_SIZE);
    assert!(
        core::mem::size_of::<ProbeTimestamp>() % core::mem::align_of::<ProbeTimestamp>() == 0
    );
};
