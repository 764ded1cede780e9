//! Memory-mapped packet rings
//!
//! A ring is an array of fixed-size frame slots shared with the kernel
//! through a `PACKET_TX_RING`/`PACKET_RX_RING` mapping (TPACKET_V2). Each
//! slot starts with a status word; whoever the status names as owner is the
//! only party allowed to touch the slot's bytes.
//!
//! ## Ownership protocol
//!
//! Transmit slots cycle `UserAvailable -> KernelQueued -> UserAvailable`
//! (or `Malformed`, which the user resets before reuse). Receive slots cycle
//! `KernelOwnsRx -> UserReady -> KernelOwnsRx`.
//!
//! All transitions go through [`TxRing::acquire`], [`TxSlot::submit`],
//! [`RxRing::take`] and the release performed when an [`RxSlot`] is dropped.
//! Slot memory is never reachable outside those handles.

use crate::sys::{self, Readiness, TpacketReq};
use netdelay_common::{
    DATA_SIZE, ETH_HLEN, KICK_BACKOFF_US, KICK_RETRIES, RING_SOCKET_BUFFER, RX_RING_SEND_BUFFER,
    TX_RING_RECV_BUFFER,
};
use log::{info, warn};
use std::{
    io,
    os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd},
    ptr::NonNull,
    sync::atomic::{AtomicU32, Ordering},
    thread,
    time::Duration,
};
use thiserror::Error;

/// Ring errors
#[derive(Debug, Error)]
pub enum RingError {
    #[error("unknown network device '{0}'")]
    DeviceUnknown(String),
    #[error("cannot create packet socket: {0}")]
    Socket(#[source] io::Error),
    #[error("cannot bind packet socket to '{device}': {source}")]
    BindFailed {
        device: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot set socket option {option}: {source}")]
    SocketOption {
        option: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("unsupported ring configuration: {0}")]
    UnsupportedRingConfig(String),
    #[error("cannot map ring memory: {0}")]
    MapFailed(#[source] io::Error),
    #[error("transmit queue full")]
    QueueFull,
    #[error("cannot kick transmission: {0}")]
    Kick(#[source] io::Error),
}

/// Direction of a ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingKind {
    Tx,
    Rx,
}

/// Ownership tag of a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// Transmit slot free for the user to fill
    UserAvailable,
    /// Transmit slot submitted, awaiting transmission
    KernelQueued,
    /// Receive slot the kernel may write
    KernelOwnsRx,
    /// Receive slot holding data for the user
    UserReady,
    /// Transmit slot the kernel rejected; reset before reuse
    Malformed,
}

impl SlotStatus {
    /// Decode a kernel status word
    pub fn from_raw(kind: RingKind, raw: u32) -> Self {
        match kind {
            RingKind::Tx => match raw {
                sys::TP_STATUS_AVAILABLE => SlotStatus::UserAvailable,
                sys::TP_STATUS_WRONG_FORMAT => SlotStatus::Malformed,
                _ => SlotStatus::KernelQueued,
            },
            RingKind::Rx => {
                if raw & sys::TP_STATUS_USER != 0 {
                    SlotStatus::UserReady
                } else {
                    SlotStatus::KernelOwnsRx
                }
            }
        }
    }

    /// Encode as the status word handed to the kernel
    pub fn to_raw(self) -> u32 {
        match self {
            SlotStatus::UserAvailable => sys::TP_STATUS_AVAILABLE,
            SlotStatus::KernelQueued => sys::TP_STATUS_SEND_REQUEST,
            SlotStatus::KernelOwnsRx => sys::TP_STATUS_KERNEL,
            SlotStatus::UserReady => sys::TP_STATUS_USER,
            SlotStatus::Malformed => sys::TP_STATUS_WRONG_FORMAT,
        }
    }

    /// May the user reuse this transmit slot
    fn is_reclaimable(self) -> bool {
        matches!(self, SlotStatus::UserAvailable | SlotStatus::Malformed)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Block and frame layout of a ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    pub kind: RingKind,
    pub frame_size: usize,
    pub block_size: usize,
    pub frames_per_block: usize,
    pub block_count: usize,
    /// Actual capacity, at least the requested frame count
    pub frame_count: usize,
    /// Offset of the Ethernet header inside a frame
    pub header_offset: usize,
    /// Offset of the payload inside a frame
    pub data_offset: usize,
}

impl RingGeometry {
    /// Lay out a ring of at least `desired_frames` frames
    ///
    /// The block size starts at one page and doubles until a frame fits.
    pub fn compute(kind: RingKind, page_size: usize, desired_frames: usize) -> Result<Self, RingError> {
        if desired_frames == 0 {
            return Err(RingError::UnsupportedRingConfig(
                "ring needs at least one frame".to_string(),
            ));
        }
        if page_size == 0 || !page_size.is_power_of_two() {
            return Err(RingError::UnsupportedRingConfig(format!(
                "page size {} is not a power of two",
                page_size
            )));
        }

        let (frame_size, data_offset, header_offset) = match kind {
            RingKind::Tx => {
                let header_offset = sys::TPACKET2_HDRLEN - sys::SOCKADDR_LL_SIZE;
                (
                    sys::tpacket_align(sys::TPACKET2_HDRLEN) + sys::tpacket_align(DATA_SIZE),
                    header_offset + ETH_HLEN,
                    header_offset,
                )
            }
            RingKind::Rx => {
                let data_offset = sys::tpacket_align(sys::TPACKET2_HDRLEN + ETH_HLEN);
                (
                    data_offset + sys::tpacket_align(DATA_SIZE),
                    data_offset,
                    data_offset - ETH_HLEN,
                )
            }
        };

        let mut block_size = page_size;
        while block_size < frame_size {
            block_size <<= 1;
        }
        let frames_per_block = block_size / frame_size;
        let block_count = desired_frames.div_ceil(frames_per_block);
        let frame_count = block_count * frames_per_block;

        if u32::try_from(block_size * block_count).is_err() || u32::try_from(frame_count).is_err() {
            return Err(RingError::UnsupportedRingConfig(format!(
                "{} frames do not fit a ring",
                desired_frames
            )));
        }

        Ok(Self {
            kind,
            frame_size,
            block_size,
            frames_per_block,
            block_count,
            frame_count,
            header_offset,
            data_offset,
        })
    }

    /// Byte offset of frame `index` from the start of the mapping
    pub fn frame_offset(&self, index: usize) -> usize {
        (index / self.frames_per_block) * self.block_size
            + (index % self.frames_per_block) * self.frame_size
    }

    /// Bytes mapped for the whole ring
    pub fn map_len(&self) -> usize {
        self.block_size * self.block_count
    }

    fn request(&self) -> TpacketReq {
        TpacketReq {
            tp_block_size: self.block_size as u32,
            tp_block_nr: self.block_count as u32,
            tp_frame_size: self.frame_size as u32,
            tp_frame_nr: self.frame_count as u32,
        }
    }
}

// ============================================================================
// Slot memory
// ============================================================================

/// Frame memory shared with the kernel, and the calls that signal it
///
/// Implemented by [`MappedRing`] over a real packet socket; tests use an
/// in-memory stand-in that plays the kernel's part.
pub trait RingMemory {
    fn geometry(&self) -> &RingGeometry;

    /// Status word of slot `index`
    fn load_status(&self, index: usize) -> u32;

    /// Publish a new status word for slot `index`
    fn store_status(&mut self, index: usize, raw: u32);

    /// Bytes of frame `index`, status word included
    fn frame(&self, index: usize) -> &[u8];

    fn frame_mut(&mut self, index: usize) -> &mut [u8];

    /// Ask the kernel to transmit queued slots
    fn kick(&mut self) -> io::Result<()>;

    /// Wait for a received slot; `None` waits forever
    fn wait_readable(&self, timeout: Option<Duration>) -> io::Result<Readiness>;
}

/// Options applied to ring sockets
#[derive(Debug, Clone, Copy, Default)]
pub struct RingOptions {
    /// `SO_BUSY_POLL` microseconds for the receive ring
    pub busy_poll: Option<u32>,
}

/// A TPACKET_V2 ring mapped from a packet socket
pub struct MappedRing {
    fd: OwnedFd,
    map: NonNull<u8>,
    geometry: RingGeometry,
}

impl MappedRing {
    /// Create, configure, bind and map a packet socket ring
    fn open(
        device: &str,
        kind: RingKind,
        protocol: u16,
        desired_frames: usize,
        options: &RingOptions,
    ) -> Result<Self, RingError> {
        let ifindex = sys::if_index(device).ok_or_else(|| RingError::DeviceUnknown(device.to_string()))?;
        let geometry = RingGeometry::compute(kind, sys::page_size(), desired_frames)?;

        // SAFETY: plain socket(2) call; ownership moves into OwnedFd below.
        let raw = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                i32::from(protocol.to_be()),
            )
        };
        if raw < 0 {
            return Err(RingError::Socket(io::Error::last_os_error()));
        }
        // SAFETY: raw is a freshly created descriptor owned by nobody else.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        bind(fd.as_raw_fd(), ifindex, protocol).map_err(|source| RingError::BindFailed {
            device: device.to_string(),
            source,
        })?;
        configure(fd.as_raw_fd(), kind, options)?;

        let req = geometry.request();
        let ring_option = match kind {
            RingKind::Tx => sys::PACKET_TX_RING,
            RingKind::Rx => sys::PACKET_RX_RING,
        };
        sys::setsockopt_raw(fd.as_raw_fd(), libc::SOL_PACKET, ring_option, &req).map_err(|e| {
            RingError::UnsupportedRingConfig(format!("{:?}: {}", req, e))
        })?;

        // SAFETY: maps the ring the kernel just allocated for this socket;
        // the mapping is released in Drop before the descriptor closes.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                geometry.map_len(),
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(RingError::MapFailed(io::Error::last_os_error()));
        }
        let map = NonNull::new(addr as *mut u8)
            .ok_or_else(|| RingError::MapFailed(io::Error::from(io::ErrorKind::InvalidData)))?;

        info!(
            "{:?} ring on {}: {} frames of {} bytes in {} blocks of {} bytes",
            kind,
            device,
            geometry.frame_count,
            geometry.frame_size,
            geometry.block_count,
            geometry.block_size
        );

        Ok(Self { fd, map, geometry })
    }

    fn status_word(&self, index: usize) -> &AtomicU32 {
        debug_assert!(index < self.geometry.frame_count);
        // SAFETY: every frame offset is inside the mapping and 16-byte
        // aligned; tp_status is the first u32 of struct tpacket2_hdr and is
        // only ever accessed atomically by both sides.
        unsafe { &*(self.map.as_ptr().add(self.geometry.frame_offset(index)) as *const AtomicU32) }
    }
}

impl RingMemory for MappedRing {
    fn geometry(&self) -> &RingGeometry {
        &self.geometry
    }

    fn load_status(&self, index: usize) -> u32 {
        self.status_word(index).load(Ordering::Acquire)
    }

    fn store_status(&mut self, index: usize, raw: u32) {
        self.status_word(index).store(raw, Ordering::Release);
    }

    fn frame(&self, index: usize) -> &[u8] {
        // SAFETY: the frame lies inside the mapping; callers only read frames
        // whose status hands them to the user.
        unsafe {
            std::slice::from_raw_parts(
                self.map.as_ptr().add(self.geometry.frame_offset(index)),
                self.geometry.frame_size,
            )
        }
    }

    fn frame_mut(&mut self, index: usize) -> &mut [u8] {
        // SAFETY: as in frame(), with &mut self guaranteeing a unique borrow.
        unsafe {
            std::slice::from_raw_parts_mut(
                self.map.as_ptr().add(self.geometry.frame_offset(index)),
                self.geometry.frame_size,
            )
        }
    }

    fn kick(&mut self) -> io::Result<()> {
        // SAFETY: a zero-length send on a TX ring socket only triggers
        // transmission of queued slots.
        let rc = unsafe { libc::send(self.fd.as_raw_fd(), std::ptr::null(), 0, libc::MSG_DONTWAIT) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn wait_readable(&self, timeout: Option<Duration>) -> io::Result<Readiness> {
        sys::poll_readable(self.fd.as_raw_fd(), timeout)
    }
}

impl Drop for MappedRing {
    fn drop(&mut self) {
        // SAFETY: map/map_len describe the mapping created in open().
        let rc = unsafe { libc::munmap(self.map.as_ptr() as *mut libc::c_void, self.geometry.map_len()) };
        if rc != 0 {
            warn!("munmap failed: {}", io::Error::last_os_error());
        }
    }
}

fn bind(fd: RawFd, ifindex: u32, protocol: u16) -> io::Result<()> {
    // SAFETY: sockaddr_ll is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
    addr.sll_family = libc::AF_PACKET as libc::c_ushort;
    addr.sll_protocol = protocol.to_be();
    addr.sll_ifindex = ifindex as libc::c_int;

    // SAFETY: addr is a fully initialised sockaddr_ll.
    let rc = unsafe {
        libc::bind(
            fd,
            &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn configure(fd: RawFd, kind: RingKind, options: &RingOptions) -> Result<(), RingError> {
    let opt = |option: &'static str, result: io::Result<()>| {
        result.map_err(|source| RingError::SocketOption { option, source })
    };

    opt(
        "PACKET_VERSION",
        sys::setsockopt_int(fd, libc::SOL_PACKET, sys::PACKET_VERSION, sys::TPACKET_V2),
    )?;

    match kind {
        RingKind::Rx => {
            // Older kernels lack the option. The transmit ring's qdisc bypass
            // then keeps outgoing probes away from packet taps.
            if let Err(e) = sys::setsockopt_int(fd, libc::SOL_PACKET, sys::PACKET_IGNORE_OUTGOING, 1) {
                warn!("PACKET_IGNORE_OUTGOING not supported: {}", e);
            }
            opt("SO_RCVBUFFORCE", sys::force_recv_buffer(fd, RING_SOCKET_BUFFER))?;
            opt("SO_SNDBUFFORCE", sys::force_send_buffer(fd, RX_RING_SEND_BUFFER))?;
            if let Some(busy_poll) = options.busy_poll {
                opt(
                    "SO_BUSY_POLL",
                    sys::setsockopt_int(fd, libc::SOL_SOCKET, sys::SO_BUSY_POLL, busy_poll as i32),
                )?;
            }
        }
        RingKind::Tx => {
            opt("PACKET_LOSS", sys::setsockopt_int(fd, libc::SOL_PACKET, sys::PACKET_LOSS, 1))?;
            opt(
                "PACKET_QDISC_BYPASS",
                sys::setsockopt_int(fd, libc::SOL_PACKET, sys::PACKET_QDISC_BYPASS, 1),
            )?;
            opt("SO_RCVBUFFORCE", sys::force_recv_buffer(fd, TX_RING_RECV_BUFFER))?;
            opt("SO_SNDBUFFORCE", sys::force_send_buffer(fd, RING_SOCKET_BUFFER))?;
        }
    }

    Ok(())
}

fn status_of<M: RingMemory>(mem: &M, index: usize) -> SlotStatus {
    SlotStatus::from_raw(mem.geometry().kind, mem.load_status(index))
}

// ============================================================================
// Transmit ring
// ============================================================================

/// Outcome of submitting a transmit slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submitted {
    /// The kernel accepted the kick
    Sent,
    /// The kernel stayed out of buffer space through every retry; the slot
    /// remains queued and is reclaimed once the kernel is done with it
    Dropped,
}

/// Transmit ring: `head` is the next slot to fill, `tail` the oldest slot
/// not yet reclaimed
pub struct TxRing<M: RingMemory = MappedRing> {
    mem: M,
    head: usize,
    tail: usize,
}

impl TxRing<MappedRing> {
    /// Open the transmit ring on `device`
    pub fn open(device: &str, desired_frames: usize, options: &RingOptions) -> Result<Self, RingError> {
        MappedRing::open(device, RingKind::Tx, 0, desired_frames, options).map(Self::new)
    }
}

impl<M: RingMemory> TxRing<M> {
    pub fn new(mem: M) -> Self {
        debug_assert_eq!(mem.geometry().kind, RingKind::Tx);
        Self { mem, head: 0, tail: 0 }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.mem.geometry().frame_count
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Current ownership tag of a slot
    pub fn status(&self, index: usize) -> SlotStatus {
        status_of(&self.mem, index)
    }

    /// Advance `tail` over every slot the kernel has finished with
    fn reclaim(&mut self) {
        while self.tail != self.head {
            let status = self.status(self.tail);
            if !status.is_reclaimable() {
                break;
            }
            if status == SlotStatus::Malformed {
                warn!("kernel rejected transmit slot {}", self.tail);
                self.mem.store_status(self.tail, SlotStatus::UserAvailable.to_raw());
            }
            self.tail = (self.tail + 1) % self.capacity();
        }
    }

    /// Reclaim finished slots, then hand out the slot at `head`
    pub fn acquire(&mut self) -> Result<TxSlot<'_, M>, RingError> {
        self.reclaim();

        let index = self.head;
        let status = self.status(index);
        if !status.is_reclaimable() {
            return Err(RingError::QueueFull);
        }
        if status == SlotStatus::Malformed {
            self.mem.store_status(index, SlotStatus::UserAvailable.to_raw());
        }

        Ok(TxSlot { ring: self, index })
    }

    #[cfg(test)]
    pub(crate) fn memory_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    fn kick_with_retry(&mut self) -> Result<Submitted, RingError> {
        let mut retries = KICK_RETRIES;
        loop {
            match self.mem.kick() {
                Ok(()) => return Ok(Submitted::Sent),
                Err(e) if e.raw_os_error() == Some(libc::ENOBUFS) => {
                    if retries == 0 {
                        warn!("transmit dropped, kernel out of buffer space: {}", e);
                        return Ok(Submitted::Dropped);
                    }
                    retries -= 1;
                    thread::sleep(Duration::from_micros(KICK_BACKOFF_US));
                }
                Err(e) => return Err(RingError::Kick(e)),
            }
        }
    }
}

/// A transmit slot owned by the user until submitted
///
/// Dropping it without submitting leaves the slot available and `head`
/// unchanged.
pub struct TxSlot<'a, M: RingMemory> {
    ring: &'a mut TxRing<M>,
    index: usize,
}

impl<M: RingMemory> TxSlot<'_, M> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Frame bytes starting at the Ethernet header
    pub fn buf_mut(&mut self) -> &mut [u8] {
        let offset = self.ring.mem.geometry().header_offset;
        &mut self.ring.mem.frame_mut(self.index)[offset..]
    }

    /// Hand the first `len` bytes of the frame to the kernel and advance `head`
    pub fn submit(self, len: usize) -> Result<Submitted, RingError> {
        let ring = self.ring;
        let index = self.index;

        let frame = ring.mem.frame_mut(index);
        frame[sys::TP_LEN_OFFSET..sys::TP_LEN_OFFSET + 4].copy_from_slice(&(len as u32).to_ne_bytes());
        ring.mem.store_status(index, SlotStatus::KernelQueued.to_raw());
        ring.head = (index + 1) % ring.capacity();

        ring.kick_with_retry()
    }
}

// ============================================================================
// Receive ring
// ============================================================================

/// Receive ring: `read_index` is the next slot to inspect
pub struct RxRing<M: RingMemory = MappedRing> {
    mem: M,
    read_index: usize,
}

impl RxRing<MappedRing> {
    /// Open the receive ring on `device` for frames of `protocol`
    pub fn open(
        device: &str,
        protocol: u16,
        desired_frames: usize,
        options: &RingOptions,
    ) -> Result<Self, RingError> {
        MappedRing::open(device, RingKind::Rx, protocol, desired_frames, options).map(Self::new)
    }
}

impl<M: RingMemory> RxRing<M> {
    pub fn new(mem: M) -> Self {
        debug_assert_eq!(mem.geometry().kind, RingKind::Rx);
        Self { mem, read_index: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.mem.geometry().frame_count
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn status(&self, index: usize) -> SlotStatus {
        status_of(&self.mem, index)
    }

    /// Block until a frame may be waiting; `None` waits forever
    pub fn wait_readable(&self, timeout: Option<Duration>) -> io::Result<Readiness> {
        self.mem.wait_readable(timeout)
    }

    /// The slot at `read_index`, if the kernel has handed it to the user
    pub fn take(&mut self) -> Option<RxSlot<'_, M>> {
        let index = self.read_index;
        if self.status(index) != SlotStatus::UserReady {
            return None;
        }
        Some(RxSlot { ring: self, index })
    }

    #[cfg(test)]
    pub(crate) fn memory_mut(&mut self) -> &mut M {
        &mut self.mem
    }
}

/// A received slot owned by the user
///
/// Dropping the handle returns the slot to the kernel and advances
/// `read_index`, so every taken slot is released exactly once.
pub struct RxSlot<'a, M: RingMemory> {
    ring: &'a mut RxRing<M>,
    index: usize,
}

impl<M: RingMemory> RxSlot<'_, M> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bytes captured by the kernel, starting at the Ethernet header
    pub fn frame(&self) -> &[u8] {
        let geometry = self.ring.mem.geometry();
        let raw = self.ring.mem.frame(self.index);
        let snaplen = u32::from_ne_bytes([
            raw[sys::TP_SNAPLEN_OFFSET],
            raw[sys::TP_SNAPLEN_OFFSET + 1],
            raw[sys::TP_SNAPLEN_OFFSET + 2],
            raw[sys::TP_SNAPLEN_OFFSET + 3],
        ]) as usize;
        let end = (geometry.header_offset + snaplen).min(geometry.frame_size);
        &raw[geometry.header_offset..end]
    }

    /// Bytes following the Ethernet header
    pub fn payload(&self) -> &[u8] {
        self.frame().get(ETH_HLEN..).unwrap_or(&[])
    }

    /// Return the slot to the kernel
    pub fn release(self) {}
}

impl<M: RingMemory> Drop for RxSlot<'_, M> {
    fn drop(&mut self) {
        let ring = &mut *self.ring;
        ring.mem.store_status(self.index, SlotStatus::KernelOwnsRx.to_raw());
        ring.read_index = (self.index + 1) % ring.capacity();
    }
}
