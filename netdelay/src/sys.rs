//! Thin wrappers over the Linux socket and poll interfaces
//!
//! Only what the rings and datagram sockets need; everything here maps one
//! syscall to one `io::Result`.

use std::{ffi::CString, io, mem, os::fd::RawFd, time::Duration};

// ============================================================================
// Kernel ABI (from linux/if_packet.h)
// ============================================================================

pub const PACKET_RX_RING: libc::c_int = 5;
pub const PACKET_VERSION: libc::c_int = 10;
pub const PACKET_TX_RING: libc::c_int = 13;
pub const PACKET_LOSS: libc::c_int = 14;
pub const PACKET_QDISC_BYPASS: libc::c_int = 20;
pub const PACKET_IGNORE_OUTGOING: libc::c_int = 23;

pub const TPACKET_V2: libc::c_int = 1;
pub const TPACKET_ALIGNMENT: usize = 16;

/// Size of `struct tpacket2_hdr`
pub const TPACKET2_HDR_SIZE: usize = 32;
/// Size of `struct sockaddr_ll`
pub const SOCKADDR_LL_SIZE: usize = 20;
/// `TPACKET2_HDRLEN`
pub const TPACKET2_HDRLEN: usize = tpacket_align(TPACKET2_HDR_SIZE) + SOCKADDR_LL_SIZE;

/// Byte offset of `tp_len` inside `struct tpacket2_hdr`
pub const TP_LEN_OFFSET: usize = 4;
/// Byte offset of `tp_snaplen` inside `struct tpacket2_hdr`
pub const TP_SNAPLEN_OFFSET: usize = 8;

// Receive ring status bits
pub const TP_STATUS_KERNEL: u32 = 0;
pub const TP_STATUS_USER: u32 = 1 << 0;

// Transmit ring status values
pub const TP_STATUS_AVAILABLE: u32 = 0;
pub const TP_STATUS_SEND_REQUEST: u32 = 1 << 0;
pub const TP_STATUS_SENDING: u32 = 1 << 1;
pub const TP_STATUS_WRONG_FORMAT: u32 = 1 << 2;

// Missing from older libc releases
pub const SO_BUSY_POLL: libc::c_int = 46;

/// `struct tpacket_req`
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct TpacketReq {
    pub tp_block_size: u32,
    pub tp_block_nr: u32,
    pub tp_frame_size: u32,
    pub tp_frame_nr: u32,
}

/// `TPACKET_ALIGN`
pub const fn tpacket_align(len: usize) -> usize {
    (len + TPACKET_ALIGNMENT - 1) & !(TPACKET_ALIGNMENT - 1)
}

// ============================================================================
// Readiness
// ============================================================================

/// Outcome of waiting for a descriptor to become readable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Data is waiting
    Readable,
    /// Woken without data
    Spurious,
    /// A signal arrived before any data
    Interrupted,
    /// Error or hangup reported without data
    Hangup,
    /// The timeout elapsed
    TimedOut,
}

/// Wait until `fd` is readable; `None` waits forever
pub fn poll_readable(fd: RawFd, timeout: Option<Duration>) -> io::Result<Readiness> {
    let mut pfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let timeout_ms = match timeout {
        Some(d) => d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
        None => -1,
    };

    // SAFETY: pfd is a valid pollfd for the duration of the call.
    let n = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };
    if n < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(Readiness::Interrupted);
        }
        return Err(err);
    }
    if n == 0 {
        return Ok(Readiness::TimedOut);
    }

    if pfd.revents & libc::POLLIN != 0 {
        Ok(Readiness::Readable)
    } else if pfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 {
        Ok(Readiness::Hangup)
    } else {
        Ok(Readiness::Spurious)
    }
}

// ============================================================================
// Socket helpers
// ============================================================================

/// Set an integer socket option
pub fn setsockopt_int(
    fd: RawFd,
    level: libc::c_int,
    name: libc::c_int,
    value: libc::c_int,
) -> io::Result<()> {
    setsockopt_raw(fd, level, name, &value)
}

/// Set a socket option from any plain value
pub fn setsockopt_raw<T>(fd: RawFd, level: libc::c_int, name: libc::c_int, value: &T) -> io::Result<()> {
    // SAFETY: value points to size_of::<T>() readable bytes.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            value as *const T as *const libc::c_void,
            mem::size_of::<T>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Set a buffer size beyond `rmem_max`/`wmem_max`, falling back to the
/// capped option without `CAP_NET_ADMIN`
pub fn force_buffer(fd: RawFd, forced: libc::c_int, capped: libc::c_int, size: i32) -> io::Result<()> {
    match setsockopt_int(fd, libc::SOL_SOCKET, forced, size) {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EPERM) => {
            log::debug!("forced buffer size not permitted, using capped option: {}", e);
            setsockopt_int(fd, libc::SOL_SOCKET, capped, size)
        }
        Err(e) => Err(e),
    }
}

/// Force the receive buffer size
pub fn force_recv_buffer(fd: RawFd, size: i32) -> io::Result<()> {
    force_buffer(fd, libc::SO_RCVBUFFORCE, libc::SO_RCVBUF, size)
}

/// Force the send buffer size
pub fn force_send_buffer(fd: RawFd, size: i32) -> io::Result<()> {
    force_buffer(fd, libc::SO_SNDBUFFORCE, libc::SO_SNDBUF, size)
}

/// Resolve an interface name to its index
pub fn if_index(device: &str) -> Option<u32> {
    let name = CString::new(device).ok()?;
    // SAFETY: name is a valid NUL-terminated string.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    (index != 0).then_some(index)
}

/// System page size
pub fn page_size() -> usize {
    // SAFETY: sysconf has no memory-safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}
