//! Cooperative shutdown
//!
//! The run loops check a [`Shutdown`] token at every suspension point:
//! before sending, after each readiness wait and while pacing. SIGINT and
//! SIGTERM set the process-wide flag.

use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

/// Signal that requested shutdown, 0 while none has arrived
static SIGNALLED: AtomicI32 = AtomicI32::new(0);

extern "C" fn on_signal(signo: libc::c_int) {
    SIGNALLED.store(signo, Ordering::SeqCst);
}

/// Shutdown request shared by the run loop and whoever may stop it
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    flag: Arc<AtomicBool>,
    watch_signals: bool,
}

impl Shutdown {
    /// A token only [`Shutdown::request`] can trigger
    pub fn new() -> Self {
        Self::default()
    }

    /// A token also triggered by SIGINT and SIGTERM
    ///
    /// The handlers are installed without `SA_RESTART`, so a blocked
    /// `poll` returns early and the loop sees the request.
    pub fn from_signals() -> io::Result<Self> {
        for signo in [libc::SIGINT, libc::SIGTERM] {
            // SAFETY: sigaction is zero-initialisable; the handler only
            // performs an atomic store, which is async-signal-safe.
            unsafe {
                let mut action: libc::sigaction = std::mem::zeroed();
                action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
                libc::sigemptyset(&mut action.sa_mask);
                if libc::sigaction(signo, &action, std::ptr::null_mut()) != 0 {
                    return Err(io::Error::last_os_error());
                }
            }
        }
        Ok(Self {
            flag: Arc::new(AtomicBool::new(false)),
            watch_signals: true,
        })
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || (self.watch_signals && SIGNALLED.load(Ordering::SeqCst) != 0)
    }

    /// The signal that stopped the process, if any
    pub fn signal(&self) -> Option<i32> {
        if !self.watch_signals {
            return None;
        }
        match SIGNALLED.load(Ordering::SeqCst) {
            0 => None,
            signo => Some(signo),
        }
    }

    /// Sleep for `duration` unless shutdown is requested first
    ///
    /// Returns false when the sleep was cut short by a request.
    pub fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(10);

        let deadline = Instant::now() + duration;
        loop {
            if self.is_requested() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(SLICE));
        }
    }
}
