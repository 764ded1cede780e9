//! netdelay - network round-trip latency measurement
//!
//! Prints one line per 16 accepted samples: minimum, average and maximum
//! round-trip delay in nanoseconds.
//!
//! ## Usage
//!
//! ```bash
//! # Layer 2, bypassing the kernel network stack
//! sudo ./netdelay -R -i eth0
//! sudo ./netdelay -I -i eth0 -d 02:00:00:00:00:02
//!
//! # UDP over a dual-stack socket, pinned with realtime priority
//! ./netdelay -R -u -P 5000
//! sudo ./netdelay -I -u -h 2001:db8::2 -P 5000 -c 2 -r 50 -m -t
//! ```

use anyhow::{Context, Result};
use clap::{error::ErrorKind, ArgAction, ArgGroup, CommandFactory, Parser};
use log::{error, info, warn};
use netdelay::{
    config::{Plan, Role, RunConfig, Transport},
    datagram::{self, DatagramInitiator, DatagramProtocol, DatagramResponder},
    exporter::{self, ExporterType},
    frame::MacAddr,
    l2::{L2Endpoint, L2Initiator, L2Responder},
    net,
    ring::{RxRing, TxRing},
    setup::{self, LatencyHint},
    window::WindowMode,
    Session, Shutdown, SystemClock,
};
use netdelay_common::{ETH_P_802_EX1, RX_RING_FRAMES, TX_RING_FRAMES};
use std::{io, net::SocketAddr, process::ExitCode};

/// Network round-trip delay measurement
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = None,
    disable_help_flag = true,
    disable_version_flag = true,
    group(ArgGroup::new("role").required(true).args(["initiator", "responder"])),
)]
struct Args {
    /// Initiator mode
    #[clap(short = 'I')]
    initiator: bool,

    /// Responder mode
    #[clap(short = 'R')]
    responder: bool,

    /// Use UDP instead of layer 2
    #[clap(short = 'u', conflicts_with = "udplite")]
    udp: bool,

    /// Use UDP-Lite instead of layer 2
    #[clap(short = 'U')]
    udplite: bool,

    /// Force IPv4 for UDP/UDP-Lite
    #[clap(short = '4')]
    ipv4: bool,

    /// Network device to use; with UDP/UDP-Lite this disables routing and
    /// requires an IPv6 link-local destination
    #[clap(short = 'i', value_name = "NETDEVICE")]
    device: Option<String>,

    /// Ethernet address of the responder
    #[clap(short = 'd', value_name = "DESTINATION-MAC")]
    destination_mac: Option<MacAddr>,

    /// UDP/UDP-Lite destination host
    #[clap(short = 'h', value_name = "DESTINATION-HOST")]
    host: Option<String>,

    /// UDP/UDP-Lite local and remote port (1-65535)
    #[clap(short = 'P')]
    port: Option<u16>,

    /// DSCP value for UDP/UDP-Lite (1-63)
    #[clap(short = 'D')]
    dscp: Option<u8>,

    /// 802.1p priority (1-7)
    #[clap(short = 'p')]
    priority: Option<u8>,

    /// 802.1Q VLAN (1-4094)
    #[clap(short = 'v')]
    vlan: Option<u16>,

    /// Busy poll microseconds (1-500)
    #[clap(short = 'b')]
    busy_poll: Option<u32>,

    /// Realtime priority (1-99)
    #[clap(short = 'r')]
    realtime: Option<i32>,

    /// Core to run on (0-1023)
    #[clap(short = 'c')]
    cpu: Option<usize>,

    /// System latency via /dev/cpu_dma_latency (0-9999)
    #[clap(short = 'l')]
    latency: Option<i32>,

    /// Lock process memory
    #[clap(short = 'm')]
    lock_memory: bool,

    /// Print a timestamp before every line
    #[clap(short = 't')]
    timestamps: bool,

    /// Output format
    #[clap(long, value_enum, default_value_t = ExporterType::Plain)]
    format: ExporterType,

    /// Average over the whole run instead of the last 16 samples
    #[clap(long)]
    cumulative: bool,

    /// Verbose logging
    #[clap(long)]
    verbose: bool,

    /// Print help
    #[clap(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Print version
    #[clap(long, action = ArgAction::Version)]
    version: Option<bool>,
}

impl Args {
    fn to_config(&self) -> RunConfig {
        let role = if self.initiator {
            Role::Initiator
        } else {
            Role::Responder
        };
        let transport = if self.udp {
            Transport::Udp
        } else if self.udplite {
            Transport::UdpLite
        } else {
            Transport::L2
        };

        RunConfig {
            ipv4_only: self.ipv4,
            device: self.device.clone(),
            destination_mac: self.destination_mac,
            host: self.host.clone(),
            port: self.port,
            dscp: self.dscp,
            priority: self.priority,
            vlan_id: self.vlan,
            busy_poll: self.busy_poll,
            realtime: self.realtime,
            cpu: self.cpu,
            dma_latency: self.latency,
            lock_memory: self.lock_memory,
            timestamps: self.timestamps,
            format: self.format,
            window: if self.cumulative {
                WindowMode::Cumulative
            } else {
                WindowMode::Reset
            },
            ..RunConfig::new(role, transport)
        }
    }
}

/// A plan with its addresses looked up
enum Target {
    L2Initiator {
        device: String,
        source: MacAddr,
        destination: MacAddr,
    },
    L2Responder {
        device: String,
    },
    DatagramInitiator {
        protocol: DatagramProtocol,
        port: u16,
        destination: SocketAddr,
    },
    DatagramResponder {
        protocol: DatagramProtocol,
        port: u16,
    },
}

/// An opened transport ready to run
enum Endpoint {
    L2Initiator(L2Initiator<SystemClock>),
    L2Responder(L2Responder),
    DatagramInitiator(DatagramInitiator<SystemClock>),
    DatagramResponder(DatagramResponder),
}

impl Endpoint {
    fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        match self {
            Endpoint::L2Initiator(initiator) => initiator.run(shutdown),
            Endpoint::L2Responder(responder) => responder.run(shutdown),
            Endpoint::DatagramInitiator(initiator) => initiator.run(shutdown),
            Endpoint::DatagramResponder(responder) => responder.run(shutdown),
        }
    }
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();

    let config = args.to_config();
    let plan = match config.plan() {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("error: {}\n\n{}", e, Args::command().render_help());
            return ExitCode::from(1);
        }
    };
    if config.vlan_id.is_some() && config.priority.is_none() {
        warn!("VLAN id ignored without a priority (-p)");
    }

    let shutdown = match Shutdown::from_signals() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            error!("Cannot install signal handlers: {}", e);
            return ExitCode::from(1);
        }
    };

    match run(&config, plan, &shutdown) {
        Ok(()) => match shutdown.signal() {
            Some(signo) => {
                info!("Stopped by signal {}", signo);
                ExitCode::from((128 + signo).clamp(0, 255) as u8)
            }
            None => ExitCode::from(1),
        },
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run(config: &RunConfig, plan: Plan, shutdown: &Shutdown) -> Result<()> {
    let target = resolve(config, plan)?;

    if config.lock_memory {
        setup::lock_memory()?;
    }
    if let Some(cpu) = config.cpu {
        setup::pin_to_cpu(cpu)?;
    }

    let mut endpoint = open(config, target)?;

    if let Some(priority) = config.realtime {
        setup::set_realtime(priority)?;
    }
    let _latency_hint = config.dma_latency.map(LatencyHint::request).transpose()?;

    endpoint.run(shutdown)
}

fn resolve(config: &RunConfig, plan: Plan) -> Result<Target> {
    Ok(match plan {
        Plan::L2Initiator {
            device,
            destination,
        } => Target::L2Initiator {
            source: net::interface_mac(&device).with_context(|| format!("Cannot access {}", device))?,
            device,
            destination,
        },
        Plan::L2Responder { device } => {
            net::interface_mac(&device).with_context(|| format!("Cannot access {}", device))?;
            Target::L2Responder { device }
        }
        Plan::DatagramInitiator {
            protocol,
            host,
            port,
        } => {
            let destination = net::resolve_destination(&host, port, config.ipv4_only)
                .and_then(|addr| net::check_scope(addr, config.device.as_deref()))
                .with_context(|| format!("Invalid destination {}", host))?;
            Target::DatagramInitiator {
                protocol,
                port,
                destination,
            }
        }
        Plan::DatagramResponder { protocol, port } => Target::DatagramResponder { protocol, port },
    })
}

fn session(config: &RunConfig) -> Session<SystemClock> {
    Session::new(
        SystemClock,
        exporter::exporter_for(config.format, io::stdout()),
        config.window,
        config.timestamps,
    )
}

fn open(config: &RunConfig, target: Target) -> Result<Endpoint> {
    let ring_options = config.ring_options();

    Ok(match target {
        Target::L2Initiator {
            device,
            source,
            destination,
        } => {
            let tx = TxRing::open(&device, TX_RING_FRAMES, &ring_options)
                .with_context(|| format!("Cannot access {}", device))?;
            let rx = RxRing::open(&device, ETH_P_802_EX1, RX_RING_FRAMES, &ring_options)
                .with_context(|| format!("Cannot access {}", device))?;
            let endpoint = L2Endpoint {
                src: source,
                dst: destination,
                tag: config.priority_tag(),
            };
            Endpoint::L2Initiator(L2Initiator::new(tx, rx, endpoint, session(config)))
        }
        Target::L2Responder { device } => {
            let rx = RxRing::open(&device, ETH_P_802_EX1, RX_RING_FRAMES, &ring_options)
                .with_context(|| format!("Cannot access {}", device))?;
            let tx = TxRing::open(&device, TX_RING_FRAMES, &ring_options)
                .with_context(|| format!("Cannot access {}", device))?;
            Endpoint::L2Responder(L2Responder::new(rx, tx, config.priority_tag()))
        }
        Target::DatagramInitiator {
            protocol,
            port,
            destination,
        } => {
            let socket = datagram::open_socket(destination.is_ipv4(), protocol, &config.datagram_options(port))
                .context("Cannot open datagram socket")?;
            Endpoint::DatagramInitiator(DatagramInitiator::new(socket, destination, session(config)))
        }
        Target::DatagramResponder { protocol, port } => {
            let socket = datagram::open_socket(config.ipv4_only, protocol, &config.datagram_options(port))
                .context("Cannot open datagram socket")?;
            Endpoint::DatagramResponder(DatagramResponder::new(socket))
        }
    })
}
