//! Run configuration
//!
//! Holds the options gathered from the command line and checks them into a
//! [`Plan`]: which role runs over which transport, with everything that role
//! needs guaranteed present.

use crate::{
    datagram::{DatagramOptions, DatagramProtocol},
    exporter::ExporterType,
    frame::{MacAddr, PriorityTag},
    ring::RingOptions,
    window::WindowMode,
};
use netdelay_common::{
    MAX_BUSY_POLL_US, MAX_CPU, MAX_DMA_LATENCY_US, MAX_DSCP, MAX_PRIORITY, MAX_RT_PRIORITY,
    MAX_VLAN_ID,
};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("layer 2 mode needs a network device (-i)")]
    MissingDevice,
    #[error("layer 2 initiator needs a destination MAC address (-d)")]
    MissingDestinationMac,
    #[error("datagram initiator needs a destination host (-h)")]
    MissingHost,
    #[error("datagram mode needs a port (-P)")]
    MissingPort,
    #[error("{option} must be between {min} and {max}, got {value}")]
    OutOfRange {
        option: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Which end of the measurement this process is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// How probes travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    /// Raw Ethernet frames through packet rings
    #[default]
    L2,
    Udp,
    UdpLite,
}

impl Transport {
    pub fn datagram_protocol(self) -> Option<DatagramProtocol> {
        match self {
            Transport::L2 => None,
            Transport::Udp => Some(DatagramProtocol::Udp),
            Transport::UdpLite => Some(DatagramProtocol::UdpLite),
        }
    }
}

/// Everything the command line can set
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub role: Role,
    pub transport: Transport,
    pub ipv4_only: bool,
    pub device: Option<String>,
    pub destination_mac: Option<MacAddr>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dscp: Option<u8>,
    pub priority: Option<u8>,
    pub vlan_id: Option<u16>,
    pub busy_poll: Option<u32>,
    pub realtime: Option<i32>,
    pub cpu: Option<usize>,
    pub dma_latency: Option<i32>,
    pub lock_memory: bool,
    pub timestamps: bool,
    pub format: ExporterType,
    pub window: WindowMode,
}

impl RunConfig {
    /// A configuration with every option unset
    pub fn new(role: Role, transport: Transport) -> Self {
        Self {
            role,
            transport,
            ipv4_only: false,
            device: None,
            destination_mac: None,
            host: None,
            port: None,
            dscp: None,
            priority: None,
            vlan_id: None,
            busy_poll: None,
            realtime: None,
            cpu: None,
            dma_latency: None,
            lock_memory: false,
            timestamps: false,
            format: ExporterType::default(),
            window: WindowMode::default(),
        }
    }
}

/// A validated run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    L2Initiator {
        device: String,
        destination: MacAddr,
    },
    L2Responder {
        device: String,
    },
    DatagramInitiator {
        protocol: DatagramProtocol,
        host: String,
        port: u16,
    },
    DatagramResponder {
        protocol: DatagramProtocol,
        port: u16,
    },
}

fn check_range<T: Copy + Into<i64>>(
    option: &'static str,
    value: Option<T>,
    min: i64,
    max: i64,
) -> Result<(), ConfigError> {
    match value.map(Into::into) {
        Some(value) if value < min || value > max => Err(ConfigError::OutOfRange {
            option,
            value,
            min,
            max,
        }),
        _ => Ok(()),
    }
}

impl RunConfig {
    /// Check option ranges and combinations
    pub fn plan(&self) -> Result<Plan, ConfigError> {
        check_range("priority (-p)", self.priority, 1, MAX_PRIORITY.into())?;
        check_range("VLAN id (-v)", self.vlan_id, 1, MAX_VLAN_ID.into())?;
        check_range("DSCP (-D)", self.dscp, 1, MAX_DSCP.into())?;
        check_range("busy poll (-b)", self.busy_poll, 1, MAX_BUSY_POLL_US.into())?;
        check_range("realtime priority (-r)", self.realtime, 1, MAX_RT_PRIORITY.into())?;
        check_range("CPU (-c)", self.cpu.map(|c| c as i64), 0, MAX_CPU as i64)?;
        check_range("system latency (-l)", self.dma_latency, 0, MAX_DMA_LATENCY_US.into())?;
        check_range("port (-P)", self.port, 1, u16::MAX.into())?;

        match self.transport.datagram_protocol() {
            None => {
                let device = self.device.clone().ok_or(ConfigError::MissingDevice)?;
                match self.role {
                    Role::Initiator => Ok(Plan::L2Initiator {
                        device,
                        destination: self.destination_mac.ok_or(ConfigError::MissingDestinationMac)?,
                    }),
                    Role::Responder => Ok(Plan::L2Responder { device }),
                }
            }
            Some(protocol) => {
                let port = self.port.ok_or(ConfigError::MissingPort)?;
                match self.role {
                    Role::Initiator => Ok(Plan::DatagramInitiator {
                        protocol,
                        host: self.host.clone().ok_or(ConfigError::MissingHost)?,
                        port,
                    }),
                    Role::Responder => Ok(Plan::DatagramResponder { protocol, port }),
                }
            }
        }
    }

    /// The 802.1Q tag, present when a priority is set
    pub fn priority_tag(&self) -> Option<PriorityTag> {
        self.priority
            .map(|priority| PriorityTag::new(priority, self.vlan_id.unwrap_or(0)))
    }

    pub fn ring_options(&self) -> RingOptions {
        RingOptions {
            busy_poll: self.busy_poll,
        }
    }

    pub fn datagram_options(&self, port: u16) -> DatagramOptions {
        DatagramOptions {
            port,
            device: self.device.clone(),
            dscp: self.dscp,
            priority: self.priority,
            cpu: self.cpu,
            busy_poll: self.busy_poll,
        }
    }
}
