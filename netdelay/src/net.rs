//! Addressing helpers
//!
//! Destination resolution and validation for the datagram initiator, and
//! hardware address lookup for the layer 2 transport.

use crate::{frame::MacAddr, sys};
use log::debug;
use netdelay_common::ETH_ALEN;
use socket2::{Domain, Socket, Type};
use std::{
    io,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6, ToSocketAddrs},
    os::fd::AsRawFd,
};
use thiserror::Error;

/// Addressing errors
#[derive(Debug, Error)]
pub enum AddressError {
    #[error("cannot resolve '{0}'")]
    Unresolvable(String),
    #[error("{0} is not a usable destination")]
    Rejected(IpAddr),
    #[error("{0} needs a network device")]
    DeviceRequired(Ipv6Addr),
    #[error("{0} is not link-local, required when a network device is given")]
    LinkLocalRequired(IpAddr),
    #[error("unknown network device '{0}'")]
    DeviceUnknown(String),
    #[error("cannot read hardware address of '{device}': {source}")]
    HardwareAddress {
        device: String,
        #[source]
        source: io::Error,
    },
    #[error("'{0}' is not an Ethernet device")]
    NotEthernet(String),
}

/// Is `addr` an acceptable IPv4 destination: not unspecified, below the
/// multicast range
pub fn usable_v4(addr: Ipv4Addr) -> bool {
    !addr.is_unspecified() && u32::from(addr) < 0xe000_0000
}

/// Is `addr` an acceptable IPv6 destination: link-local `fe80::/64`,
/// unique-local `fc00::/7` or global unicast `2000::/3`
pub fn usable_v6(addr: Ipv6Addr) -> bool {
    let segments = addr.segments();
    let octets = addr.octets();
    segments[..4] == [0xfe80u16, 0, 0, 0] || (octets[0] & 0xfe) == 0xfc || (octets[0] & 0xe0) == 0x20
}

fn validate(addr: IpAddr) -> Result<IpAddr, AddressError> {
    let usable = match addr {
        IpAddr::V4(v4) => usable_v4(v4),
        IpAddr::V6(v6) => usable_v6(v6),
    };
    if usable {
        Ok(addr)
    } else {
        Err(AddressError::Rejected(addr))
    }
}

/// Resolve the destination host of a datagram initiator
///
/// Literal IPv4 addresses come first, then literal IPv6 addresses unless
/// `ipv4_only`, then name resolution, which prefers IPv6 unless
/// `ipv4_only`.
///
/// # Arguments
///
/// * `host` - Address literal or host name
/// * `port` - Destination port
/// * `ipv4_only` - Only accept IPv4 destinations
pub fn resolve_destination(host: &str, port: u16, ipv4_only: bool) -> Result<SocketAddr, AddressError> {
    if let Ok(v4) = host.parse::<Ipv4Addr>() {
        return validate(IpAddr::V4(v4)).map(|ip| SocketAddr::new(ip, port));
    }
    if !ipv4_only {
        if let Ok(v6) = host.parse::<Ipv6Addr>() {
            return validate(IpAddr::V6(v6)).map(|ip| SocketAddr::new(ip, port));
        }
    }

    let candidates: Vec<IpAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|e| {
            debug!("Resolving {} failed: {}", host, e);
            AddressError::Unresolvable(host.to_string())
        })?
        .map(|addr| addr.ip())
        .collect();

    let preferred = if ipv4_only {
        None
    } else {
        candidates.iter().copied().find(IpAddr::is_ipv6)
    };
    let chosen = preferred
        .or_else(|| candidates.iter().copied().find(IpAddr::is_ipv4))
        .ok_or_else(|| AddressError::Unresolvable(host.to_string()))?;
    debug!("{} resolved to {}", host, chosen);

    validate(chosen).map(|ip| SocketAddr::new(ip, port))
}

/// Match a destination against the device binding
///
/// Without a device an IPv6 destination must not be link-local; with one it
/// must be, and it gains the device's index as scope id. IPv4 destinations
/// pass unchanged.
pub fn check_scope(destination: SocketAddr, device: Option<&str>) -> Result<SocketAddr, AddressError> {
    let SocketAddr::V6(v6) = destination else {
        return Ok(destination);
    };
    let link_local = v6.ip().octets()[0] == 0xfe;

    match (link_local, device) {
        (true, None) => Err(AddressError::DeviceRequired(*v6.ip())),
        (false, Some(_)) => Err(AddressError::LinkLocalRequired(destination.ip())),
        (false, None) => Ok(destination),
        (true, Some(device)) => {
            let index = sys::if_index(device).ok_or_else(|| AddressError::DeviceUnknown(device.to_string()))?;
            Ok(SocketAddr::V6(SocketAddrV6::new(*v6.ip(), v6.port(), v6.flowinfo(), index)))
        }
    }
}

/// Hardware address of an Ethernet device (`SIOCGIFHWADDR`)
pub fn interface_mac(device: &str) -> Result<MacAddr, AddressError> {
    let hw_err = |source: io::Error| AddressError::HardwareAddress {
        device: device.to_string(),
        source,
    };

    // SAFETY: ifreq is plain old data; all-zero is a valid value.
    let mut req: libc::ifreq = unsafe { std::mem::zeroed() };
    let name = device.as_bytes();
    if name.is_empty() || name.len() >= req.ifr_name.len() || name.contains(&0) {
        return Err(AddressError::DeviceUnknown(device.to_string()));
    }
    for (dst, &src) in req.ifr_name.iter_mut().zip(name) {
        *dst = src as libc::c_char;
    }

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None).map_err(hw_err)?;
    // SAFETY: req is a valid ifreq with a NUL-terminated name.
    let rc = unsafe { libc::ioctl(socket.as_raw_fd(), libc::SIOCGIFHWADDR as _, &mut req as *mut libc::ifreq) };
    if rc != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ENODEV) {
            return Err(AddressError::DeviceUnknown(device.to_string()));
        }
        return Err(hw_err(err));
    }

    // SAFETY: SIOCGIFHWADDR fills the hardware address member of the union.
    let hwaddr = unsafe { req.ifr_ifru.ifru_hwaddr };
    if hwaddr.sa_family != libc::ARPHRD_ETHER {
        return Err(AddressError::NotEthernet(device.to_string()));
    }

    let mut mac = [0u8; ETH_ALEN];
    for (dst, &src) in mac.iter_mut().zip(hwaddr.sa_data.iter()) {
        *dst = src as u8;
    }
    Ok(MacAddr(mac))
}
