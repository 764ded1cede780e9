//! Layer 2 initiator and responder
//!
//! Both drive one transmit ring and one receive ring on the same device.
//! The initiator sends one timestamped probe per iteration and measures the
//! echo; the responder echoes every probe with source and destination
//! swapped.

use crate::{
    clock::Clock,
    frame::{self, EthernetHeader, MacAddr, PriorityTag},
    ring::{MappedRing, RingError, RingMemory, RxRing, RxSlot, Submitted, TxRing},
    session::{Session, Skip, Step, Verdict},
    shutdown::Shutdown,
    sys::Readiness,
};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use netdelay_common::{
    ProbeTimestamp, ECHO_TIMEOUT_MS, ETH_P_802_EX1, PACING_INTERVAL_MS, SHUTDOWN_POLL_MS,
    TIMESTAMP_SIZE,
};
use std::time::{Duration, Instant};

/// Addresses and tagging fixed for a run
#[derive(Debug, Clone, Copy)]
pub struct L2Endpoint {
    pub src: MacAddr,
    pub dst: MacAddr,
    pub tag: Option<PriorityTag>,
}

/// Sends probes and measures their echoes
pub struct L2Initiator<C: Clock, T: RingMemory = MappedRing, R: RingMemory = MappedRing> {
    tx: TxRing<T>,
    rx: RxRing<R>,
    endpoint: L2Endpoint,
    session: Session<C>,
}

impl<C: Clock, T: RingMemory, R: RingMemory> L2Initiator<C, T, R> {
    pub fn new(tx: TxRing<T>, rx: RxRing<R>, endpoint: L2Endpoint, session: Session<C>) -> Self {
        Self {
            tx,
            rx,
            endpoint,
            session,
        }
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// Loop until shutdown or a fatal error, pacing every iteration
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        info!(
            "L2 initiator {} -> {}{}",
            self.endpoint.src,
            self.endpoint.dst,
            match self.endpoint.tag {
                Some(tag) => format!(" (priority {}, vlan {})", tag.priority(), tag.vlan_id()),
                None => String::new(),
            }
        );

        while !shutdown.is_requested() {
            self.step()?;
            if !shutdown.sleep(Duration::from_millis(PACING_INTERVAL_MS)) {
                break;
            }
        }

        info!("L2 initiator stopped");
        Ok(())
    }

    /// One send/await/measure iteration, without the pacing sleep
    pub fn step(&mut self) -> Result<Step> {
        match self.send_probe() {
            Ok(sent) => self.await_echo(sent),
            Err(skip) => Ok(Step::Skipped(skip)),
        }
    }

    /// Wait for the echo of the probe stamped `sent`
    ///
    /// Echoes of earlier probes that outlived their timeout are released
    /// and skipped while the wait continues.
    fn await_echo(&mut self, sent: ProbeTimestamp) -> Result<Step> {
        let deadline = Instant::now() + Duration::from_millis(ECHO_TIMEOUT_MS);

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let wait = if remaining.is_zero() {
                Ok(Readiness::TimedOut)
            } else {
                self.rx.wait_readable(Some(remaining))
            };
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
            let received = self.session.now();

            let echoed = {
                let Some(slot) = self.rx.take() else {
                    warn!("No data after wakeup");
                    return Ok(Step::Skipped(Skip::NoData));
                };
                let payload = slot.payload();
                if !frame::carries_timestamp(payload) {
                    warn!("Short echo of {} bytes skipped", slot.frame().len());
                    return Ok(Step::Skipped(Skip::Malformed));
                }
                ProbeTimestamp::read_from(payload)
            };
            // The slot went back to the kernel at the end of the block

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

    /// Send one probe, returning its timestamp
    fn send_probe(&mut self) -> std::result::Result<ProbeTimestamp, Skip> {
        let mut slot = match self.tx.acquire() {
            Ok(slot) => slot,
            Err(e) => {
                warn!("{}, sample skipped", e);
                return Err(Skip::QueueFull);
            }
        };

        let header = EthernetHeader {
            dst: self.endpoint.dst,
            src: self.endpoint.src,
            ethertype: ETH_P_802_EX1,
        };
        let sent = self.session.now();
        let mut payload = [0u8; TIMESTAMP_SIZE];
        sent.write_to(&mut payload);
        let len = frame::write_frame(slot.buf_mut(), &header, self.endpoint.tag, &payload);

        match slot.submit(len) {
            Ok(Submitted::Sent) => Ok(sent),
            Ok(Submitted::Dropped) => Err(Skip::SendFailed),
            Err(e) => {
                warn!("{}, sample skipped", e);
                Err(Skip::SendFailed)
            }
        }
    }
}

/// Counters of one drain pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainStats {
    pub echoed: usize,
    pub dropped: usize,
}

/// Echoes every probe it receives
pub struct L2Responder<R: RingMemory = MappedRing, T: RingMemory = MappedRing> {
    rx: RxRing<R>,
    tx: TxRing<T>,
    tag: Option<PriorityTag>,
}

impl<R: RingMemory, T: RingMemory> L2Responder<R, T> {
    pub fn new(rx: RxRing<R>, tx: TxRing<T>, tag: Option<PriorityTag>) -> Self {
        Self { rx, tx, tag }
    }

    /// Wait for probes and echo them until shutdown
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        info!("L2 responder ready");

        while !shutdown.is_requested() {
            match self
                .rx
                .wait_readable(Some(Duration::from_millis(SHUTDOWN_POLL_MS)))
                .context("Waiting for probes failed")?
            {
                Readiness::Readable => {
                    let stats = self.drain(shutdown);
                    debug!("Echoed {}, dropped {}", stats.echoed, stats.dropped);
                }
                Readiness::TimedOut | Readiness::Spurious | Readiness::Interrupted | Readiness::Hangup => {}
            }
        }

        info!("L2 responder stopped");
        Ok(())
    }

    /// Echo every slot the kernel has handed over, without waiting
    ///
    /// Stops early once shutdown is requested.
    pub fn drain(&mut self, shutdown: &Shutdown) -> DrainStats {
        let mut stats = DrainStats::default();

        while !shutdown.is_requested() {
            let Some(inbound) = self.rx.take() else {
                break;
            };
            match Self::echo(&mut self.tx, self.tag, &inbound) {
                Ok(()) => stats.echoed += 1,
                Err(reason) => {
                    warn!("Echo dropped: {}", reason);
                    stats.dropped += 1;
                }
            }
            inbound.release();
        }

        stats
    }

    fn echo(
        tx: &mut TxRing<T>,
        tag: Option<PriorityTag>,
        inbound: &RxSlot<'_, R>,
    ) -> std::result::Result<(), EchoError> {
        let request = EthernetHeader::parse(inbound.frame()).ok_or(EchoError::Truncated)?;
        let payload = inbound.payload();
        if !frame::carries_timestamp(payload) {
            return Err(EchoError::Truncated);
        }

        let mut slot = tx.acquire().map_err(EchoError::Ring)?;
        let len = frame::write_frame(slot.buf_mut(), &request.swapped(), tag, payload);
        match slot.submit(len).map_err(EchoError::Ring)? {
            Submitted::Sent => Ok(()),
            Submitted::Dropped => Err(EchoError::Dropped),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum EchoError {
    #[error("probe too short")]
    Truncated,
    #[error("{0}")]
    Ring(#[source] RingError),
    #[error("kernel out of transmit buffers")]
    Dropped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::testing::ScriptedClock,
        exporter::testing::RecordingExporter,
        ring::{testing::MemoryRing, RingKind, SlotStatus},
        sys,
        window::WindowMode,
    };
    use netdelay_common::{DATA_SIZE, ETH_HLEN, ETH_P_8021Q, RX_RING_FRAMES, TX_RING_FRAMES};

    const INITIATOR: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x01]);
    const RESPONDER: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x02]);

    fn ts(sec: i64, nsec: i64) -> ProbeTimestamp {
        ProbeTimestamp::new(sec, nsec)
    }

    fn echo_frame(sent: ProbeTimestamp) -> Vec<u8> {
        let mut buf = vec![0u8; DATA_SIZE];
        let header = EthernetHeader {
            dst: INITIATOR,
            src: RESPONDER,
            ethertype: ETH_P_802_EX1,
        };
        let mut payload = [0u8; TIMESTAMP_SIZE];
        sent.write_to(&mut payload);
        frame::write_frame(&mut buf, &header, None, &payload);
        buf
    }

    fn initiator(
        clock: ScriptedClock,
        tag: Option<PriorityTag>,
    ) -> (L2Initiator<ScriptedClock, MemoryRing, MemoryRing>, RecordingExporter) {
        let exporter = RecordingExporter::default();
        let session = Session::new(clock, Box::new(exporter.clone()), WindowMode::Reset, false);
        let endpoint = L2Endpoint {
            src: INITIATOR,
            dst: RESPONDER,
            tag,
        };
        let initiator = L2Initiator::new(
            TxRing::new(MemoryRing::new(RingKind::Tx, TX_RING_FRAMES)),
            RxRing::new(MemoryRing::new(RingKind::Rx, RX_RING_FRAMES)),
            endpoint,
            session,
        );
        (initiator, exporter)
    }

    fn responder(tag: Option<PriorityTag>) -> L2Responder<MemoryRing, MemoryRing> {
        L2Responder::new(
            RxRing::new(MemoryRing::new(RingKind::Rx, RX_RING_FRAMES)),
            TxRing::new(MemoryRing::new(RingKind::Tx, TX_RING_FRAMES)),
            tag,
        )
    }

    #[test]
    fn test_initiator_measures_echo() {
        // send at 1.000000000, echo read at 1.000050000
        let clock = ScriptedClock::new([ts(1, 0), ts(1, 50_000)]);
        let (mut initiator, _) = initiator(clock, None);
        initiator.rx.memory_mut().kernel_deliver(&echo_frame(ts(1, 0)));

        let step = initiator.step().unwrap();

        // First valid sample goes to the warm-up
        assert_eq!(step, Step::Measured(Verdict::WarmUp));
        let sent = initiator.tx.memory_mut().kernel_transmit();
        assert_eq!(sent.len(), 1);
        let probe = EthernetHeader::parse(&sent[0]).unwrap();
        assert_eq!(probe.src, INITIATOR);
        assert_eq!(probe.dst, RESPONDER);
        assert_eq!(probe.ethertype, ETH_P_802_EX1);
        assert_eq!(ProbeTimestamp::read_from(&sent[0][ETH_HLEN..]), ts(1, 0));
        // Receive slot went back to the kernel
        assert_eq!(initiator.rx.status(0), SlotStatus::KernelOwnsRx);
        assert_eq!(initiator.rx.read_index(), 1);
    }

    #[test]
    fn test_initiator_accepts_after_warmup() {
        let clock = ScriptedClock::default();
        let (mut initiator, exporter) = initiator(clock, None);

        for i in 0..21 {
            let sent = ts(10 + i, 0);
            let clock = initiator.session.clock();
            clock.push(sent);
            clock.push(ts(10 + i, 50_000));
            initiator.rx.memory_mut().kernel_deliver(&echo_frame(sent));
            let step = initiator.step().unwrap();
            initiator.tx.memory_mut().kernel_transmit();
            if i < 20 {
                assert_eq!(step, Step::Measured(Verdict::WarmUp));
            } else {
                assert_eq!(step, Step::Measured(Verdict::Accepted { nanos: 50_000 }));
            }
        }
        assert_eq!(initiator.session().window().count(), 1);
        assert!(exporter.lines.borrow().is_empty());
    }

    #[test]
    fn test_initiator_tagged_probe() {
        let clock = ScriptedClock::new([ts(1, 0), ts(1, 1)]);
        let (mut initiator, _) = initiator(clock, Some(PriorityTag::new(5, 7)));
        initiator.rx.memory_mut().kernel_deliver(&echo_frame(ts(1, 0)));
        initiator.step().unwrap();

        let sent = initiator.tx.memory_mut().kernel_transmit();
        let frame = &sent[0];
        assert_eq!(frame.len(), DATA_SIZE);
        assert_eq!(EthernetHeader::parse(frame).unwrap().ethertype, ETH_P_8021Q);
        assert_eq!(u16::from_be_bytes([frame[14], frame[15]]), (5 << 13) | 7);
        assert_eq!(u16::from_be_bytes([frame[16], frame[17]]), ETH_P_802_EX1);
        assert_eq!(ProbeTimestamp::read_from(&frame[18..]), ts(1, 0));
    }

    #[test]
    fn test_initiator_timeout_is_skip() {
        let (mut initiator, _) = initiator(ScriptedClock::default(), None);
        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::Timeout));
    }

    #[test]
    fn test_initiator_spurious_wakeup_is_skip() {
        let (mut initiator, _) = initiator(ScriptedClock::default(), None);
        initiator.rx.memory_mut().script_readiness([Readiness::Readable, Readiness::Spurious]);

        // Readable but no slot handed over
        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::NoData));
        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::NoData));
        assert_eq!(initiator.rx.read_index(), 0);
    }

    #[test]
    fn test_initiator_interrupted_wait_is_skip() {
        let (mut initiator, _) = initiator(ScriptedClock::default(), None);
        initiator.rx.memory_mut().script_readiness([Readiness::Interrupted]);
        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::Interrupted));
    }

    #[test]
    fn test_initiator_discards_late_echo() {
        // Probe stamped 5.000000100, late echo read at 5.000000200, own echo
        // at 5.000000300
        let clock = ScriptedClock::new([ts(5, 100), ts(5, 200), ts(5, 300)]);
        let (mut initiator, _) = initiator(clock, None);
        // Measured against the new probe, this echo would be a clock regression
        initiator.rx.memory_mut().kernel_deliver(&echo_frame(ts(9, 0)));
        initiator.rx.memory_mut().kernel_deliver(&echo_frame(ts(5, 100)));

        assert_eq!(initiator.step().unwrap(), Step::Measured(Verdict::WarmUp));
        assert_eq!(initiator.rx.read_index(), 2);
        assert_eq!(initiator.rx.status(0), SlotStatus::KernelOwnsRx);
    }

    #[test]
    fn test_initiator_late_echo_alone_times_out() {
        let clock = ScriptedClock::new([ts(5, 100), ts(5, 200)]);
        let (mut initiator, _) = initiator(clock, None);
        initiator.rx.memory_mut().kernel_deliver(&echo_frame(ts(4, 900)));

        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::Timeout));
        assert_eq!(initiator.rx.read_index(), 1);
    }

    #[test]
    fn test_initiator_stale_echo_is_skipped() {
        let clock = ScriptedClock::new([ts(5, 0), ts(6, 200)]);
        let (mut initiator, _) = initiator(clock, None);
        initiator.rx.memory_mut().kernel_deliver(&echo_frame(ts(5, 0)));

        assert_eq!(initiator.step().unwrap(), Step::Measured(Verdict::Stale));
        assert_eq!(initiator.rx.status(0), SlotStatus::KernelOwnsRx);
    }

    #[test]
    fn test_initiator_clock_regression_is_fatal() {
        let clock = ScriptedClock::new([ts(5, 11), ts(5, 10)]);
        let (mut initiator, _) = initiator(clock, None);
        initiator.rx.memory_mut().kernel_deliver(&echo_frame(ts(5, 11)));

        assert!(initiator.step().is_err());
        // The slot was still released before aborting
        assert_eq!(initiator.rx.status(0), SlotStatus::KernelOwnsRx);
    }

    #[test]
    fn test_initiator_short_echo_is_released() {
        let (mut initiator, _) = initiator(ScriptedClock::default(), None);
        initiator.rx.memory_mut().kernel_deliver(&echo_frame(ts(0, 0))[..ETH_HLEN + 4]);

        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::Malformed));
        assert_eq!(initiator.rx.read_index(), 1);
    }

    #[test]
    fn test_initiator_queue_full_is_skip() {
        let (mut initiator, _) = initiator(ScriptedClock::default(), None);
        let cap = initiator.tx.capacity();
        for i in 0..cap {
            initiator.tx.memory_mut().kernel_set_status(i, sys::TP_STATUS_SEND_REQUEST);
        }
        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::QueueFull));

        initiator.tx.memory_mut().kernel_set_status(0, sys::TP_STATUS_AVAILABLE);
        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::Timeout));
    }

    #[test]
    fn test_initiator_dropped_send_is_skip() {
        let (mut initiator, _) = initiator(ScriptedClock::default(), None);
        initiator
            .tx
            .memory_mut()
            .fail_kicks(std::iter::repeat(libc::ENOBUFS).take(6));
        assert_eq!(initiator.step().unwrap(), Step::Skipped(Skip::SendFailed));
    }

    #[test]
    fn test_initiator_emits_every_sixteen_samples() {
        let (mut initiator, exporter) = initiator(ScriptedClock::default(), None);

        for i in 0..(20 + 36) {
            let sent = ts(100 + i, 0);
            let latency = if i % 2 == 0 { 40_000 } else { 60_000 };
            let clock = initiator.session.clock();
            clock.push(sent);
            clock.push(ts(100 + i, latency));
            initiator.rx.memory_mut().kernel_deliver(&echo_frame(sent));
            initiator.step().unwrap();
            initiator.tx.memory_mut().kernel_transmit();
        }

        let lines = exporter.lines.borrow();
        assert_eq!(lines.len(), 2);
        for line in lines.iter() {
            assert_eq!(line.aggregate.min_ns, 40_000);
            assert_eq!(line.aggregate.avg_ns, 50_000);
            assert_eq!(line.aggregate.max_ns, 60_000);
        }
        assert_eq!(initiator.session().window().count(), 4);
    }

    fn probe_from_initiator(tag: Option<PriorityTag>) -> Vec<u8> {
        let mut buf = vec![0u8; DATA_SIZE];
        let header = EthernetHeader {
            dst: RESPONDER,
            src: INITIATOR,
            ethertype: ETH_P_802_EX1,
        };
        let payload: Vec<u8> = (0..50u8).collect();
        frame::write_frame(&mut buf, &header, tag, &payload);
        buf
    }

    #[test]
    fn test_responder_swaps_addresses_and_copies_payload() {
        let mut responder = responder(None);
        let probe = probe_from_initiator(None);
        responder.rx.memory_mut().kernel_deliver(&probe);

        let stats = responder.drain(&Shutdown::new());
        assert_eq!(stats, DrainStats { echoed: 1, dropped: 0 });

        let echoes = responder.tx.memory_mut().kernel_transmit();
        assert_eq!(echoes.len(), 1);
        let echo = &echoes[0];
        let header = EthernetHeader::parse(echo).unwrap();
        assert_eq!(header.src, RESPONDER);
        assert_eq!(header.dst, INITIATOR);
        assert_eq!(header.ethertype, ETH_P_802_EX1);
        assert_eq!(&echo[ETH_HLEN..], &probe[ETH_HLEN..]);
        assert_eq!(responder.rx.status(0), SlotStatus::KernelOwnsRx);
    }

    #[test]
    fn test_responder_tags_echo() {
        let mut responder = responder(Some(PriorityTag::new(6, 0)));
        // The kernel strips the tag on receive, so the probe arrives untagged
        let probe = probe_from_initiator(None);
        responder.rx.memory_mut().kernel_deliver(&probe);
        responder.drain(&Shutdown::new());

        let echo = &responder.tx.memory_mut().kernel_transmit()[0];
        assert_eq!(EthernetHeader::parse(echo).unwrap().ethertype, ETH_P_8021Q);
        assert_eq!(u16::from_be_bytes([echo[14], echo[15]]), 6 << 13);
        assert_eq!(u16::from_be_bytes([echo[16], echo[17]]), ETH_P_802_EX1);
        assert_eq!(&echo[18..34], &probe[ETH_HLEN..ETH_HLEN + 16]);
    }

    #[test]
    fn test_responder_drains_all_pending() {
        let mut responder = responder(None);
        for _ in 0..5 {
            responder.rx.memory_mut().kernel_deliver(&probe_from_initiator(None));
        }
        assert_eq!(responder.drain(&Shutdown::new()).echoed, 5);
        assert_eq!(responder.rx.read_index(), 5);
        assert_eq!(responder.tx.head(), 5);
        assert_eq!(responder.tx.memory_mut().kernel_transmit().len(), 5);
    }

    #[test]
    fn test_responder_releases_when_queue_full() {
        let mut responder = responder(None);
        let cap = responder.tx.capacity();
        for i in 0..cap {
            responder.tx.memory_mut().kernel_set_status(i, sys::TP_STATUS_SEND_REQUEST);
        }
        for _ in 0..3 {
            responder.rx.memory_mut().kernel_deliver(&probe_from_initiator(None));
        }

        let stats = responder.drain(&Shutdown::new());
        assert_eq!(stats, DrainStats { echoed: 0, dropped: 3 });
        assert_eq!(responder.rx.read_index(), 3);
        for i in 0..3 {
            assert_eq!(responder.rx.status(i), SlotStatus::KernelOwnsRx);
        }
    }

    #[test]
    fn test_responder_drain_stops_on_shutdown() {
        let mut responder = responder(None);
        for _ in 0..3 {
            responder.rx.memory_mut().kernel_deliver(&probe_from_initiator(None));
        }
        let shutdown = Shutdown::new();
        shutdown.request();

        assert_eq!(responder.drain(&shutdown), DrainStats::default());
        assert_eq!(responder.rx.read_index(), 0);
        assert_eq!(responder.tx.head(), 0);
    }

    #[test]
    fn test_responder_drops_truncated_probe() {
        let mut responder = responder(None);
        responder.rx.memory_mut().kernel_deliver(&probe_from_initiator(None)[..10]);
        assert_eq!(responder.drain(&Shutdown::new()), DrainStats { echoed: 0, dropped: 1 });
        assert_eq!(responder.tx.head(), 0);
    }

    #[test]
    fn test_end_to_end_over_memory_rings() {
        let clock = ScriptedClock::new([ts(1, 0), ts(1, 50_000)]);
        let (mut initiator, _) = initiator(clock, None);
        let mut responder = responder(None);

        // Probe travels initiator -> responder before the initiator waits
        initiator.send_probe().unwrap();
        for frame in initiator.tx.memory_mut().kernel_transmit() {
            responder.rx.memory_mut().kernel_deliver(&frame);
        }
        responder.drain(&Shutdown::new());
        for frame in responder.tx.memory_mut().kernel_transmit() {
            initiator.rx.memory_mut().kernel_deliver(&frame);
        }

        let received = initiator.session.now();
        let slot = initiator.rx.take().unwrap();
        let sent = ProbeTimestamp::read_from(slot.payload());
        slot.release();
        assert_eq!(crate::clock::elapsed(sent, received).unwrap(), ts(0, 50_000));
    }
}
