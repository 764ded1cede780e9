//! Probe frame codec
//!
//! Builds and parses the wire layout of an L2 probe directly inside ring
//! slots:
//!
//! ```text
//! dst(6) | src(6) | ethertype(2) | [tci(2) | inner ethertype(2)] | timestamp(16) | reserved
//! ```
//!
//! The whole frame is `DATA_SIZE` bytes. Reserved bytes are zero on probes
//! and copied verbatim on echoes.

use netdelay_common::{
    DATA_SIZE, ETH_ALEN, ETH_HLEN, ETH_P_8021Q, MAX_PRIORITY, MAX_VLAN_ID, TIMESTAMP_SIZE,
    VLAN_TAG_LEN,
};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Ethernet hardware address
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; ETH_ALEN]);

/// Rejected MAC address text
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid MAC address '{0}', expected xx:xx:xx:xx:xx:xx")]
pub struct MacParseError(pub String);

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MacParseError(s.to_string());
        let mut octets = [0u8; ETH_ALEN];
        let mut groups = s.split(':');

        for octet in octets.iter_mut() {
            let group = groups.next().ok_or_else(err)?;
            if group.len() != 2 || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(err());
            }
            *octet = u8::from_str_radix(group, 16).map_err(|_| err())?;
        }
        if groups.next().is_some() {
            return Err(err());
        }

        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

/// 802.1Q tag carrying an 802.1p priority
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriorityTag {
    priority: u8,
    vlan_id: u16,
}

impl PriorityTag {
    /// Out-of-range values are masked to their field widths
    pub fn new(priority: u8, vlan_id: u16) -> Self {
        Self {
            priority: priority.min(MAX_PRIORITY),
            vlan_id: vlan_id.min(MAX_VLAN_ID) & 0x0fff,
        }
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn vlan_id(&self) -> u16 {
        self.vlan_id
    }

    /// Tag control information: `priority:3 | DEI 0:1 | vlan id:12`
    pub fn tci(&self) -> u16 {
        (u16::from(self.priority) << 13) | self.vlan_id
    }
}

/// Ethernet header
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Parse the header at the start of `frame`
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < ETH_HLEN {
            return None;
        }
        let mut dst = [0u8; ETH_ALEN];
        let mut src = [0u8; ETH_ALEN];
        dst.copy_from_slice(&frame[0..6]);
        src.copy_from_slice(&frame[6..12]);
        Some(Self {
            dst: MacAddr(dst),
            src: MacAddr(src),
            ethertype: u16::from_be_bytes([frame[12], frame[13]]),
        })
    }

    fn write(&self, frame: &mut [u8]) {
        frame[0..6].copy_from_slice(&self.dst.0);
        frame[6..12].copy_from_slice(&self.src.0);
        frame[12..14].copy_from_slice(&self.ethertype.to_be_bytes());
    }

    /// Header for the reply to a frame carrying this header
    pub fn swapped(&self) -> Self {
        Self {
            dst: self.src,
            src: self.dst,
            ethertype: self.ethertype,
        }
    }
}

/// Payload bytes available after the headers of a `DATA_SIZE` frame
pub const fn payload_capacity(tag: Option<PriorityTag>) -> usize {
    match tag {
        Some(_) => DATA_SIZE - ETH_HLEN - VLAN_TAG_LEN,
        None => DATA_SIZE - ETH_HLEN,
    }
}

/// Write a frame into `buf`, returning the number of bytes to transmit
///
/// `header.ethertype` names the payload protocol. With a tag, the outer
/// ethertype becomes 802.1Q and the payload protocol moves into the tag.
/// `payload` longer than the frame allows is truncated; the remainder of the
/// frame is zeroed.
pub fn write_frame(
    buf: &mut [u8],
    header: &EthernetHeader,
    tag: Option<PriorityTag>,
    payload: &[u8],
) -> usize {
    let frame = &mut buf[..DATA_SIZE];

    let body = match tag {
        Some(tag) => {
            EthernetHeader {
                ethertype: ETH_P_8021Q,
                ..*header
            }
            .write(frame);
            frame[ETH_HLEN..ETH_HLEN + 2].copy_from_slice(&tag.tci().to_be_bytes());
            frame[ETH_HLEN + 2..ETH_HLEN + 4].copy_from_slice(&header.ethertype.to_be_bytes());
            &mut frame[ETH_HLEN + VLAN_TAG_LEN..]
        }
        None => {
            header.write(frame);
            &mut frame[ETH_HLEN..]
        }
    };

    let n = payload.len().min(payload_capacity(tag));
    body[..n].copy_from_slice(&payload[..n]);
    body[n..].fill(0);

    DATA_SIZE
}

/// Does a received payload hold at least a timestamp
pub fn carries_timestamp(payload: &[u8]) -> bool {
    payload.len() >= TIMESTAMP_SIZE
}
