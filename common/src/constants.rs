//! Shared constants for netdelay transports
//!
//! These constants are used by both roles and both transports to ensure
//! the probes are timing-comparable and the rings are sized identically
//! on each end.

// ============================================================================
// Probe Payload
// ============================================================================

/// Fixed probe size in bytes, identical for L2 and datagram modes
pub const DATA_SIZE: usize = 64;

/// Bytes of the probe occupied by the monotonic timestamp
pub const TIMESTAMP_SIZE: usize = 16;

// ============================================================================
// Ethernet (from linux/if_ether.h)
// ============================================================================

/// Length of an Ethernet hardware address
pub const ETH_ALEN: usize = 6;

/// Length of an Ethernet header (dst + src + ethertype)
pub const ETH_HLEN: usize = 14;

/// IEEE 802.1 local experimental ethertype carried by probes
pub const ETH_P_802_EX1: u16 = 0x88B5;

/// IEEE 802.1Q VLAN tag ethertype
pub const ETH_P_8021Q: u16 = 0x8100;

/// Length of an 802.1Q tag (TCI + inner ethertype)
pub const VLAN_TAG_LEN: usize = 4;

/// Highest 802.1p priority value
pub const MAX_PRIORITY: u8 = 7;

/// Highest usable 802.1Q VLAN id
pub const MAX_VLAN_ID: u16 = 4094;

// ============================================================================
// Packet Rings
// ============================================================================

/// Requested transmit ring capacity in frames
pub const TX_RING_FRAMES: usize = 64 * 64;

/// Requested receive ring capacity in frames
pub const RX_RING_FRAMES: usize = 64;

/// Forced send buffer of the transmit ring socket and receive buffer of the
/// receive ring socket
pub const RING_SOCKET_BUFFER: i32 = 2 * 1024 * 1024;

/// Forced send buffer of the receive ring socket
pub const RX_RING_SEND_BUFFER: i32 = 2048;

/// Forced receive buffer of the transmit ring socket
pub const TX_RING_RECV_BUFFER: i32 = 256;

/// Forced send/receive buffers of datagram sockets
pub const DATAGRAM_SOCKET_BUFFER: i32 = 1024 * 1024;

// ============================================================================
// Timing
// ============================================================================

/// Nanoseconds in one second
pub const NSEC_PER_SEC: i64 = 1_000_000_000;

/// Accepted samples discarded at the start of a run
pub const WARMUP_SAMPLES: u32 = 20;

/// An aggregate line is emitted every this many accepted samples
pub const EMIT_INTERVAL: u64 = 16;

/// How long the initiator waits for an echo (milliseconds)
pub const ECHO_TIMEOUT_MS: u64 = 1_000;

/// Pause between two probes (milliseconds)
pub const PACING_INTERVAL_MS: u64 = 50;

/// Attempts to kick the kernel when it reports no transmit buffer space
pub const KICK_RETRIES: u32 = 5;

/// Pause between two kick attempts (microseconds)
pub const KICK_BACKOFF_US: u64 = 20;

/// Slice length of an unbounded wait, so shutdown requests are observed
pub const SHUTDOWN_POLL_MS: u64 = 250;

// ============================================================================
// Protocol Numbers (from linux/in.h)
// ============================================================================

/// UDP-Lite protocol number
pub const IPPROTO_UDPLITE: i32 = 136;

// ============================================================================
// Option Ranges
// ============================================================================

/// Highest DSCP code point
pub const MAX_DSCP: u8 = 63;

/// Highest busy poll setting (microseconds)
pub const MAX_BUSY_POLL_US: u32 = 500;

/// Highest realtime scheduling priority
pub const MAX_RT_PRIORITY: i32 = 99;

/// Highest CPU core number accepted for pinning
pub const MAX_CPU: usize = 1023;

/// Highest value accepted for the system latency hint (microseconds)
pub const MAX_DMA_LATENCY_US: i32 = 9999;
