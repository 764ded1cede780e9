//! Clock adapter
//!
//! Every elapsed-time computation uses the raw monotonic clock, which NTP
//! cannot slew. The adjustable wall clock is only used to prefix output
//! lines.

use chrono::{DateTime, Local};
use netdelay_common::{ProbeTimestamp, NSEC_PER_SEC};
use thiserror::Error;

/// Fatal measurement faults
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MeasureError {
    /// The echo arrived before the probe was sent, after borrow correction
    #[error("time mismatch: received at {received:?}, sent at {sent:?}")]
    ClockRegression {
        sent: ProbeTimestamp,
        received: ProbeTimestamp,
    },
}

/// Time sources used by the initiators
pub trait Clock {
    /// Raw monotonic time
    fn monotonic(&self) -> ProbeTimestamp;

    /// Local wall-clock time
    fn wall(&self) -> DateTime<Local>;
}

/// `CLOCK_MONOTONIC_RAW` and the system local time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn monotonic(&self) -> ProbeTimestamp {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is a valid out pointer and the clock id exists on Linux.
        let rc = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut ts) };
        debug_assert_eq!(rc, 0, "clock_gettime(CLOCK_MONOTONIC_RAW) failed");
        ProbeTimestamp::new(ts.tv_sec as i64, ts.tv_nsec as i64)
    }

    fn wall(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Compute `received - sent`
///
/// When the later nanosecond component is smaller, one second is borrowed
/// so the result's nanoseconds stay in `0..NSEC_PER_SEC`. A negative seconds
/// component after the borrow is a clock regression.
pub fn elapsed(sent: ProbeTimestamp, received: ProbeTimestamp) -> Result<ProbeTimestamp, MeasureError> {
    let mut sec = received.sec.wrapping_sub(sent.sec);
    let mut nsec = received.nsec;

    if received.nsec < sent.nsec {
        nsec = nsec.wrapping_add(NSEC_PER_SEC);
        sec = sec.wrapping_sub(1);
    }
    if sec < 0 {
        return Err(MeasureError::ClockRegression { sent, received });
    }

    Ok(ProbeTimestamp::new(sec, nsec.wrapping_sub(sent.nsec)))
}

/// Format a wall-clock time as `HH:MM:SS.nnnnnnnnn`
pub fn format_wall(time: &DateTime<Local>) -> String {
    time.format("%H:%M:%S%.9f").to_string()
}

#[cfg(test)]
pub mod testing {
    //! Scripted clock for state machine tests

    use super::*;
    use chrono::TimeZone;
    use std::{cell::RefCell, collections::VecDeque};

    /// Returns queued monotonic readings in order, then repeats the last one
    #[derive(Debug, Default)]
    pub struct ScriptedClock {
        readings: RefCell<VecDeque<ProbeTimestamp>>,
        last: RefCell<ProbeTimestamp>,
    }

    impl ScriptedClock {
        pub fn new(readings: impl IntoIterator<Item = ProbeTimestamp>) -> Self {
            Self {
                readings: RefCell::new(readings.into_iter().collect()),
                last: RefCell::new(ProbeTimestamp::default()),
            }
        }

        pub fn push(&self, reading: ProbeTimestamp) {
            self.readings.borrow_mut().push_back(reading);
        }
    }

    impl Clock for ScriptedClock {
        fn monotonic(&self) -> ProbeTimestamp {
            if let Some(next) = self.readings.borrow_mut().pop_front() {
                *self.last.borrow_mut() = next;
            }
            *self.last.borrow()
        }

        fn wall(&self) -> DateTime<Local> {
            Local
                .with_ymd_and_hms(2024, 3, 1, 12, 34, 56)
                .single()
                .unwrap_or_else(Local::now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_without_borrow() {
        let sent = ProbeTimestamp::new(1, 0);
        let received = ProbeTimestamp::new(1, 50_000);
        assert_eq!(elapsed(sent, received), Ok(ProbeTimestamp::new(0, 50_000)));
    }

    #[test]
    fn test_elapsed_borrows_one_second() {
        let sent = ProbeTimestamp::new(10, 999_990_000);
        let received = ProbeTimestamp::new(11, 40_000);
        // (11 - 10 - 1) seconds, (40_000 + 1e9 - 999_990_000) nanoseconds
        assert_eq!(elapsed(sent, received), Ok(ProbeTimestamp::new(0, 50_000)));
    }

    #[test]
    fn test_elapsed_whole_seconds() {
        let sent = ProbeTimestamp::new(3, 500);
        let received = ProbeTimestamp::new(5, 100);
        assert_eq!(elapsed(sent, received), Ok(ProbeTimestamp::new(1, 999_999_600)));
    }

    #[test]
    fn test_elapsed_regression_is_error() {
        let sent = ProbeTimestamp::new(5, 100);
        let received = ProbeTimestamp::new(5, 99);
        assert_eq!(
            elapsed(sent, received),
            Err(MeasureError::ClockRegression { sent, received })
        );

        let received = ProbeTimestamp::new(4, 900_000_000);
        assert!(elapsed(sent, received).is_err());
    }

    #[test]
    fn test_monotonic_clock_advances() {
        let clock = SystemClock;
        let a = clock.monotonic();
        let b = clock.monotonic();
        assert!(elapsed(a, b).is_ok());
        assert!((0..NSEC_PER_SEC).contains(&a.nsec));
        // Time since boot, never the zeroed fallback
        assert!(a.sec > 0 || a.nsec > 0);
    }

    #[test]
    fn test_wall_format() {
        let clock = testing::ScriptedClock::default();
        let formatted = format_wall(&clock.wall());
        assert_eq!(formatted, "12:34:56.000000000");
    }
}
