//! One-time process tuning
//!
//! Everything here runs before the measurement loop starts and reduces
//! scheduling jitter. Each step is optional; a requested step that fails
//! aborts the run.

use log::info;
use std::{
    fs::{File, OpenOptions},
    io::{self, Write},
    path::Path,
};
use thiserror::Error;

const CPU_DMA_LATENCY: &str = "/dev/cpu_dma_latency";

/// Process tuning errors
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("cannot lock process memory: {0}")]
    LockMemory(#[source] io::Error),
    #[error("cannot pin to CPU {cpu}: {source}")]
    Affinity {
        cpu: usize,
        #[source]
        source: io::Error,
    },
    #[error("cannot switch to realtime priority {priority}: {source}")]
    Realtime {
        priority: i32,
        #[source]
        source: io::Error,
    },
    #[error("cannot set system latency hint: {0}")]
    LatencyHint(#[source] io::Error),
}

/// Lock all current and future pages of the process
pub fn lock_memory() -> Result<(), SetupError> {
    // SAFETY: mlockall has no memory-safety preconditions.
    if unsafe { libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) } != 0 {
        return Err(SetupError::LockMemory(io::Error::last_os_error()));
    }
    info!("Process memory locked");
    Ok(())
}

/// Restrict the process to a single CPU
pub fn pin_to_cpu(cpu: usize) -> Result<(), SetupError> {
    let affinity_err = |source| SetupError::Affinity { cpu, source };

    // SAFETY: cpu_set_t is a plain bitmask; all-zero is the empty set.
    let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
    if cpu >= libc::CPU_SETSIZE as usize {
        return Err(affinity_err(io::Error::from_raw_os_error(libc::EINVAL)));
    }
    // SAFETY: cpu is within the set bounds checked above.
    unsafe {
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(cpu, &mut set);
    }

    // SAFETY: set is a valid cpu_set_t of the size passed.
    if unsafe { libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set) } != 0 {
        return Err(affinity_err(io::Error::last_os_error()));
    }
    info!("Pinned to CPU {}", cpu);
    Ok(())
}

/// Switch to round-robin realtime scheduling
pub fn set_realtime(priority: i32) -> Result<(), SetupError> {
    let param = libc::sched_param {
        sched_priority: priority,
    };
    // SAFETY: param is a valid sched_param.
    if unsafe { libc::sched_setscheduler(0, libc::SCHED_RR, &param) } != 0 {
        return Err(SetupError::Realtime {
            priority,
            source: io::Error::last_os_error(),
        });
    }
    info!("Realtime round-robin priority {}", priority);
    Ok(())
}

/// System-wide wakeup latency request
///
/// The kernel honours the request while the device stays open; dropping the
/// hint reverts it.
#[derive(Debug)]
pub struct LatencyHint {
    _device: File,
}

impl LatencyHint {
    /// Request a maximum wakeup latency in microseconds
    pub fn request(micros: i32) -> Result<Self, SetupError> {
        let hint = Self::request_at(Path::new(CPU_DMA_LATENCY), micros)?;
        info!("System latency limited to {} us", micros);
        Ok(hint)
    }

    fn request_at(path: &Path, micros: i32) -> Result<Self, SetupError> {
        let mut device = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(SetupError::LatencyHint)?;
        device
            .write_all(&micros.to_ne_bytes())
            .map_err(SetupError::LatencyHint)?;
        Ok(Self { _device: device })
    }
}
