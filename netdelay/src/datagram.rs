//! UDP and UDP-Lite transport
//!
//! Same probe protocol as the layer 2 transport, carried in fixed-size
//! datagrams through the regular network stack.

use crate::{
    clock::Clock,
    session::{Session, Skip, Step, Verdict},
    shutdown::Shutdown,
    sys::{self, Readiness},
};
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use netdelay_common::{
    ProbeTimestamp, DATAGRAM_SOCKET_BUFFER, DATA_SIZE, ECHO_TIMEOUT_MS, IPPROTO_UDPLITE,
    PACING_INTERVAL_MS, SHUTDOWN_POLL_MS,
};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, UdpSocket},
    os::fd::AsRawFd,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Datagram socket setup errors
#[derive(Debug, Error)]
pub enum DatagramError {
    #[error("cannot create datagram socket: {0}")]
    Socket(#[source] io::Error),
    #[error("cannot set socket option {option}: {source}")]
    SocketOption {
        option: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("cannot bind to port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// Datagram protocol carrying the probes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramProtocol {
    Udp,
    UdpLite,
}

impl DatagramProtocol {
    fn protocol(self) -> Protocol {
        match self {
            DatagramProtocol::Udp => Protocol::UDP,
            DatagramProtocol::UdpLite => Protocol::from(IPPROTO_UDPLITE),
        }
    }
}

/// Socket configuration shared by both roles
#[derive(Debug, Clone, Default)]
pub struct DatagramOptions {
    /// Local port, also the destination port of probes
    pub port: u16,
    /// Bind to this device and disable routing
    pub device: Option<String>,
    /// DSCP code point
    pub dscp: Option<u8>,
    /// `SO_PRIORITY`
    pub priority: Option<u8>,
    /// `SO_INCOMING_CPU`
    pub cpu: Option<usize>,
    /// `SO_BUSY_POLL` microseconds
    pub busy_poll: Option<u32>,
}

/// Create and configure a non-blocking datagram socket bound to the wildcard
/// address
///
/// IPv6 sockets are dual-stack.
///
/// # Arguments
///
/// * `ipv4` - Open an IPv4 socket instead of an IPv6 one
/// * `protocol` - UDP or UDP-Lite
/// * `options` - Port and socket tuning
pub fn open_socket(
    ipv4: bool,
    protocol: DatagramProtocol,
    options: &DatagramOptions,
) -> Result<UdpSocket, DatagramError> {
    let opt = |option: &'static str, result: io::Result<()>| {
        result.map_err(|source| DatagramError::SocketOption { option, source })
    };

    let domain = if ipv4 { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(protocol.protocol())).map_err(DatagramError::Socket)?;
    let fd = socket.as_raw_fd();

    opt("O_NONBLOCK", socket.set_nonblocking(true))?;
    opt("SO_REUSEADDR", socket.set_reuse_address(true))?;
    if let Some(busy_poll) = options.busy_poll {
        opt(
            "SO_BUSY_POLL",
            sys::setsockopt_int(fd, libc::SOL_SOCKET, sys::SO_BUSY_POLL, busy_poll as i32),
        )?;
    }
    if let Some(cpu) = options.cpu {
        opt("SO_INCOMING_CPU", socket.set_cpu_affinity(cpu))?;
    }

    let local = if ipv4 {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, options.port))
    } else {
        opt("IPV6_V6ONLY", socket.set_only_v6(false))?;
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, options.port))
    };
    socket
        .bind(&SockAddr::from(local))
        .map_err(|source| DatagramError::Bind {
            port: options.port,
            source,
        })?;

    if let Some(device) = &options.device {
        opt("SO_BINDTODEVICE", socket.bind_device(Some(device.as_bytes())))?;
        opt(
            "SO_DONTROUTE",
            sys::setsockopt_int(fd, libc::SOL_SOCKET, libc::SO_DONTROUTE, 1),
        )?;
    }

    opt("SO_RCVBUFFORCE", sys::force_recv_buffer(fd, DATAGRAM_SOCKET_BUFFER))?;
    opt("SO_SNDBUFFORCE", sys::force_send_buffer(fd, DATAGRAM_SOCKET_BUFFER))?;

    // IP_TOS resets the socket priority, so it goes first
    if let Some(dscp) = options.dscp {
        let tos = u32::from(dscp) << 2 & 0xfc;
        if !ipv4 {
            opt(
                "IPV6_TCLASS",
                sys::setsockopt_int(fd, libc::IPPROTO_IPV6, libc::IPV6_TCLASS, tos as i32),
            )?;
        }
        opt("IP_TOS", socket.set_tos(tos))?;
        opt(
            "SO_PRIORITY",
            sys::setsockopt_int(
                fd,
                libc::SOL_SOCKET,
                libc::SO_PRIORITY,
                i32::from(options.priority.unwrap_or(0)),
            ),
        )?;
    } else if let Some(priority) = options.priority {
        opt(
            "SO_PRIORITY",
            sys::setsockopt_int(fd, libc::SOL_SOCKET, libc::SO_PRIORITY, i32::from(priority)),
        )?;
    }

    info!(
        "{:?} socket bound to {}{}",
        protocol,
        local,
        options
            .device
            .as_deref()
            .map(|d| format!(" on {}", d))
            .unwrap_or_default()
    );

    Ok(socket.into())
}

/// Address to send an echo to
///
/// A dual-stack socket reports IPv4 senders as IPv4-mapped IPv6 addresses;
/// the reply goes to the plain IPv4 address instead.
pub fn reply_address(sender: SocketAddr) -> SocketAddr {
    match sender {
        SocketAddr::V6(v6) => match v6.ip().to_ipv4_mapped() {
            Some(v4) => SocketAddr::V4(SocketAddrV4::new(v4, v6.port())),
            None => sender,
        },
        SocketAddr::V4(_) => sender,
    }
}

/// Sends datagram probes and measures their echoes
pub struct DatagramInitiator<C: Clock> {
    socket: UdpSocket,
    destination: SocketAddr,
    session: Session<C>,
}

impl<C: Clock> DatagramInitiator<C> {
    pub fn new(socket: UdpSocket, destination: SocketAddr, session: Session<C>) -> Self {
        Self {
            socket,
            destination,
            session,
        }
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// Loop until shutdown or a fatal error, pacing every iteration
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        info!("Datagram initiator -> {}", self.destination);

        while !shutdown.is_requested() {
            self.step()?;
            if !shutdown.sleep(Duration::from_millis(PACING_INTERVAL_MS)) {
                break;
            }
        }

        info!("Datagram initiator stopped");
        Ok(())
    }

    /// One send/await/measure iteration, without the pacing sleep
    pub fn step(&mut self) -> Result<Step> {
        match self.send_probe() {
            Ok(sent) => self.await_echo(sent),
            Err(skip) => Ok(Step::Skipped(skip)),
        }
    }

    /// Send one probe, returning its timestamp
    fn send_probe(&mut self) -> std::result::Result<ProbeTimestamp, Skip> {
        let sent = self.session.now();
        let mut probe = [0u8; DATA_SIZE];
        sent.write_to(&mut probe);

        match self.socket.send_to(&probe, self.destination) {
            Ok(n) if n == DATA_SIZE => Ok(sent),
            Ok(n) => {
                warn!("Short send of {} bytes, sample skipped", n);
                Err(Skip::SendFailed)
            }
            Err(e) => {
                warn!("Send to {} failed: {}", self.destination, e);
                Err(Skip::SendFailed)
            }
        }
    }

    /// Wait for the echo of the probe stamped `sent`
    ///
    /// Echoes of earlier probes that outlived their timeout are read and
    /// skipped while the wait continues.
    fn await_echo(&mut self, sent: ProbeTimestamp) -> Result<Step> {
        let deadline = Instant::now() + Duration::from_millis(ECHO_TIMEOUT_MS);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = if remaining.is_zero() {
                Ok(Readiness::TimedOut)
            } else {
                sys::poll_readable(self.socket.as_raw_fd(), Some(remaining))
            };
            let received = self.session.now();

            match wait {
                Ok(Readiness::Readable) => {}
                Ok(Readiness::TimedOut) => {
                    warn!("No echo within {} ms", ECHO_TIMEOUT_MS);
                    return Ok(Step::Skipped(Skip::Timeout));
                }
                Ok(Readiness::Interrupted) => {
                    debug!("Echo wait interrupted");
                    return Ok(Step::Skipped(Skip::Interrupted));
                }
                Ok(Readiness::Spurious | Readiness::Hangup) => {
                    warn!("No data after wakeup");
                    return Ok(Step::Skipped(Skip::NoData));
                }
                Err(e) => {
                    warn!("Waiting for echo failed: {}", e);
                    return Ok(Step::Skipped(Skip::Timeout));
                }
            }

            // Room for one extra byte so oversized echoes are detected
            let mut echo = [0u8; DATA_SIZE + 1];
            let len = match self.socket.recv(&mut echo) {
                Ok(0) => bail!("Receive returned no data, aborting"),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    warn!("No data after wakeup");
                    return Ok(Step::Skipped(Skip::NoData));
                }
                Err(e) => return Err(e).context("Receive failed, aborting"),
            };
            if len != DATA_SIZE {
                warn!("Unexpected echo length {}, sample skipped", len);
                return Ok(Step::Skipped(Skip::Malformed));
            }

            let echoed = ProbeTimestamp::read_from(&echo);
            if echoed != sent {
                debug!("Late echo of probe {:?} discarded", echoed);
                continue;
            }

            let verdict = self.session.record(sent, received)?;
            if let Verdict::Emitted { aggregate, .. } = verdict {
                debug!("Emitted aggregate over {} samples", aggregate.samples);
            }
            return Ok(Step::Measured(verdict));
        }
    }
}

/// Echoes every well-formed datagram back to its sender
pub struct DatagramResponder {
    socket: UdpSocket,
}

impl DatagramResponder {
    pub fn new(socket: UdpSocket) -> Self {
        Self { socket }
    }

    /// Wait for probes and echo them until shutdown
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        info!("Datagram responder ready");

        while !shutdown.is_requested() {
            let echoed = self.poll_once(Some(Duration::from_millis(SHUTDOWN_POLL_MS)), shutdown)?;
            if echoed > 0 {
                debug!("Echoed {}", echoed);
            }
        }

        info!("Datagram responder stopped");
        Ok(())
    }

    /// Wait up to `timeout` for probes and echo all that are queued
    ///
    /// Returns the number of echoes sent. Echoing stops early once shutdown
    /// is requested.
    pub fn poll_once(&mut self, timeout: Option<Duration>, shutdown: &Shutdown) -> Result<usize> {
        match sys::poll_readable(self.socket.as_raw_fd(), timeout).context("Waiting for probes failed")? {
            Readiness::Readable => self.drain(shutdown),
            Readiness::Hangup => bail!("Socket error on responder"),
            Readiness::TimedOut | Readiness::Spurious | Readiness::Interrupted => Ok(0),
        }
    }

    fn drain(&mut self, shutdown: &Shutdown) -> Result<usize> {
        let mut echoed = 0;
        let mut buf = [0u8; DATA_SIZE + 1];

        while !shutdown.is_requested() {
            let (len, sender) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(echoed),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Receive failed, aborting"),
            };
            if len != DATA_SIZE {
                warn!("Unexpected probe length {} from {}, ignored", len, sender);
                continue;
            }

            let target = reply_address(sender);
            match self.socket.send_to(&buf[..len], target) {
                Ok(n) if n == len => echoed += 1,
                Ok(n) => warn!("Short echo of {} bytes to {}", n, target),
                Err(e) => warn!("Echo to {} failed: {}", target, e),
            }
        }
        Ok(echoed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::{testing::ScriptedClock, SystemClock},
        exporter::testing::RecordingExporter,
        window::WindowMode,
    };
    use std::thread;

    fn loopback_socket() -> UdpSocket {
        open_socket(true, DatagramProtocol::Udp, &DatagramOptions::default()).unwrap()
    }

    fn ts(sec: i64, nsec: i64) -> ProbeTimestamp {
        ProbeTimestamp::new(sec, nsec)
    }

    fn loopback_addr(socket: &UdpSocket) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, socket.local_addr().unwrap().port()))
    }

    fn initiator<C: Clock>(clock: C, destination: SocketAddr) -> DatagramInitiator<C> {
        let session = Session::new(
            clock,
            Box::new(RecordingExporter::default()),
            WindowMode::Reset,
            false,
        );
        DatagramInitiator::new(loopback_socket(), destination, session)
    }

    #[test]
    fn test_reply_to_ipv4_mapped_sender() {
        // ::ffff:203.0.113.5:4000
        let sender: SocketAddr = "[::ffff:203.0.113.5]:4000".parse().unwrap();
        assert_eq!(reply_address(sender), "203.0.113.5:4000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_reply_to_native_senders_unchanged() {
        let v6 = SocketAddr::from((Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1), 9));
        assert_eq!(reply_address(v6), v6);
        let v4: SocketAddr = "192.0.2.1:9".parse().unwrap();
        assert_eq!(reply_address(v4), v4);
    }

    #[test]
    fn test_open_socket_is_nonblocking() {
        let socket = loopback_socket();
        let mut buf = [0u8; 8];
        let err = socket.recv(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_loopback_round_trip() {
        let mut responder = DatagramResponder::new(loopback_socket());
        let mut initiator = initiator(SystemClock, loopback_addr(&responder.socket));

        for _ in 0..3 {
            let sent = initiator.send_probe().unwrap();
            assert_eq!(responder.poll_once(Some(Duration::from_secs(1)), &Shutdown::new()).unwrap(), 1);
            assert_eq!(initiator.await_echo(sent).unwrap(), Step::Measured(Verdict::WarmUp));
        }
    }

    #[test]
    fn test_responder_echoes_bytes_verbatim() {
        let mut responder = DatagramResponder::new(loopback_socket());
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_secs(1))).unwrap();

        let probe: Vec<u8> = (0..DATA_SIZE as u8).collect();
        client.send_to(&probe, loopback_addr(&responder.socket)).unwrap();
        assert_eq!(responder.poll_once(Some(Duration::from_secs(1)), &Shutdown::new()).unwrap(), 1);

        let mut echo = [0u8; 128];
        let (len, from) = client.recv_from(&mut echo).unwrap();
        assert_eq!(&echo[..len], &probe[..]);
        assert_eq!(from.port(), responder.socket.local_addr().unwrap().port());
    }

    #[test]
    fn test_dual_stack_responder_echoes_ipv4_client() {
        let socket = open_socket(false, DatagramProtocol::Udp, &DatagramOptions::default()).unwrap();
        let mut responder = DatagramResponder::new(socket);
        let client = loopback_socket();
        let responder_addr = loopback_addr(&responder.socket);

        let probe: Vec<u8> = (0..DATA_SIZE as u8).rev().collect();
        client.send_to(&probe, responder_addr).unwrap();
        assert_eq!(responder.poll_once(Some(Duration::from_secs(1)), &Shutdown::new()).unwrap(), 1);

        // The mapped sender address is answered over plain IPv4
        assert_eq!(
            sys::poll_readable(client.as_raw_fd(), Some(Duration::from_secs(1))).unwrap(),
            Readiness::Readable
        );
        let mut echo = [0u8; 128];
        let (len, from) = client.recv_from(&mut echo).unwrap();
        assert_eq!(&echo[..len], &probe[..]);
        assert_eq!(from, responder_addr);
    }

    #[test]
    fn test_responder_stops_draining_on_shutdown() {
        let mut responder = DatagramResponder::new(loopback_socket());
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        client.send_to(&[0u8; DATA_SIZE], loopback_addr(&responder.socket)).unwrap();

        let shutdown = Shutdown::new();
        shutdown.request();
        assert_eq!(responder.poll_once(Some(Duration::from_secs(1)), &shutdown).unwrap(), 0);

        let mut echo = [0u8; 128];
        assert!(client.recv_from(&mut echo).is_err());
    }

    #[test]
    fn test_initiator_discards_late_echo() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        // Probe stamped 5.000000100; a late echo stamped 9.000000000 would
        // read as a clock regression if measured against it
        let clock = ScriptedClock::new([ts(5, 100), ts(5, 200), ts(5, 300)]);
        let mut initiator = initiator(clock, peer.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 128];
            let (len, from) = peer.recv_from(&mut buf).unwrap();
            let mut late = [0u8; DATA_SIZE];
            ts(9, 0).write_to(&mut late);
            peer.send_to(&late, from).unwrap();
            peer.send_to(&buf[..len], from).unwrap();
        });

        assert_eq!(initiator.step().unwrap(), Step::Measured(Verdict::WarmUp));
        handle.join().unwrap();
    }

    #[test]
    fn test_responder_ignores_wrong_length() {
        let mut responder = DatagramResponder::new(loopback_socket());
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_millis(100))).unwrap();

        client.send_to(&[0u8; 10], loopback_addr(&responder.socket)).unwrap();
        client.send_to(&[0u8; DATA_SIZE + 1], loopback_addr(&responder.socket)).unwrap();
        thread::sleep(Duration::from_millis(20));
        assert_eq!(responder.poll_once(Some(Duration::from_secs(1)), &Shutdown::new()).unwrap(), 0);

        let mut echo = [0u8; 128];
        assert!(client.recv_from(&mut echo).is_err());
    }

    #[test]
    fn test_responder_times_out_quietly() {
        let mut responder = DatagramResponder::new(loopback_socket());
        assert_eq!(responder.poll_once(Some(Duration::from_millis(10)), &Shutdown::new()).unwrap(), 0);
    }

    #[test]
    fn test_initiator_skips_short_echo() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut initiator = initiator(ScriptedClock::default(), peer.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 128];
            let (_, from) = peer.recv_from(&mut buf).unwrap();
            peer.send_to(&buf[..10], from).unwrap();
        });

        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::Malformed));
        handle.join().unwrap();
    }

    #[test]
    fn test_initiator_times_out() {
        let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
        let mut initiator = initiator(ScriptedClock::default(), silent.local_addr().unwrap());
        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::Timeout));
    }

    #[test]
    fn test_initiator_clock_regression_is_fatal() {
        let peer = UdpSocket::bind("127.0.0.1:0").unwrap();
        // Probe stamped at 5.000000100, echo read at 5.000000050
        let clock = ScriptedClock::new([ProbeTimestamp::new(5, 100), ProbeTimestamp::new(5, 50)]);
        let mut initiator = initiator(clock, peer.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut buf = [0u8; 128];
            let (len, from) = peer.recv_from(&mut buf).unwrap();
            peer.send_to(&buf[..len], from).unwrap();
        });

        assert!(initiator.step().is_err());
        handle.join().unwrap();
    }

    #[test]
    fn test_udplite_socket() {
        // UDP-Lite may be compiled out of the running kernel
        match open_socket(true, DatagramProtocol::UdpLite, &DatagramOptions::default()) {
            Ok(socket) => assert!(socket.local_addr().is_ok()),
            Err(DatagramError::Socket(e)) => {
                assert_eq!(e.raw_os_error(), Some(libc::EPROTONOSUPPORT));
            }
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
}
