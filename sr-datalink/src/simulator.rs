//! Discrete-event channel simulator.
//!
//! Two stations, A and B, each run an [`Engine`] and exchange numbered
//! packets in both directions over a full-duplex channel.  Each direction
//! preserves frame order but applies a fault model drawn from a seeded RNG,
//! so a failing run can be replayed exactly:
//!
//! | Fault        | Description                                         |
//! |--------------|-----------------------------------------------------|
//! | Loss         | Drop a frame with probability `loss_rate`.          |
//! | Corruption   | Flip one random bit with probability `corrupt_rate`.|
//!
//! A frame occupies its direction for a time proportional to its length
//! (a full data frame takes `LinkConfig::frame_time`), then arrives after a
//! further `propagation` delay.  A station hears `PhysicalLayerReady` once
//! its outgoing direction has drained.  Retransmission timers count from the
//! moment a frame has been clocked out, not from when the engine queued it,
//! so a backlog on the wire never fires a timer for a frame still waiting.
//!
//! Time is virtual: the simulator jumps from one event to the next, so a
//! run that covers minutes of link time completes in milliseconds.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::LinkConfig;
use crate::engine::{Engine, LinkStats};
use crate::error::LinkError;
use crate::frame::{CRC_LEN, DATA_HEADER_LEN};
use crate::port::{Event, LinkPort};
use crate::timer::{TimerKey, TimerQueue};

/// Fault model and workload for one run.
///
/// Probabilities are in `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Packets each station sends to the other.
    pub packets: u32,
    /// Probability that a frame is silently dropped.
    pub loss_rate: f64,
    /// Probability that a surviving frame has one bit flipped.
    pub corrupt_rate: f64,
    /// Delay between a frame leaving the wire and reaching the peer.
    pub propagation: Duration,
    pub seed: u64,
    /// Virtual time after which the run is abandoned.
    pub time_limit: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default; the channel is a perfect pipe.
        Self {
            packets: 100,
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            propagation: Duration::from_millis(10),
            seed: 0,
            time_limit: Duration::from_secs(3600),
        }
    }
}

/// Outcome of [`Simulator::run`].
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Packets handed up at station A (sent by B), in delivery order.
    pub delivered_at_a: Vec<Vec<u8>>,
    /// Packets handed up at station B (sent by A), in delivery order.
    pub delivered_at_b: Vec<Vec<u8>>,
    pub stats_a: LinkStats,
    pub stats_b: LinkStats,
    /// Virtual time when the run stopped.
    pub elapsed: Duration,
    /// Packets each side was supposed to send.
    pub packets: u32,
}

impl SimReport {
    /// Both sides received every packet exactly once, in order.
    pub fn is_complete(&self) -> bool {
        in_sequence(&self.delivered_at_a, self.packets)
            && in_sequence(&self.delivered_at_b, self.packets)
    }
}

/// Number stamped into the first four bytes of a generated packet.
pub fn packet_id(packet: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = packet.get(..4)?.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

fn in_sequence(delivered: &[Vec<u8>], packets: u32) -> bool {
    delivered.len() == packets as usize
        && delivered
            .iter()
            .enumerate()
            .all(|(i, p)| packet_id(p) == Some(i as u32))
}

// ---------------------------------------------------------------------------
// StationPort
// ---------------------------------------------------------------------------

/// [`LinkPort`] of one simulated station.
///
/// Frames sent while handling an event are clocked onto the outgoing
/// direction at once and parked in `outbox` with their departure time; the
/// simulator applies the fault model once the engine returns.
#[derive(Debug)]
struct StationPort {
    now: Duration,
    timers: TimerQueue<TimerKey>,
    /// `(departure, frame)` in transmission order.
    outbox: Vec<(Duration, Vec<u8>)>,
    /// When the outgoing direction becomes idle.
    busy_until: Duration,
    frame_time: Duration,
    /// Length of a full data frame, the one that takes `frame_time`.
    full_frame_len: u32,
    network_enabled: bool,
    next_packet: u32,
    total_packets: u32,
    pkt_len: usize,
    delivered: Vec<Vec<u8>>,
}

impl StationPort {
    fn new(total_packets: u32, link: &LinkConfig) -> Self {
        Self {
            now: Duration::ZERO,
            timers: TimerQueue::new(),
            outbox: Vec::new(),
            busy_until: Duration::ZERO,
            frame_time: link.frame_time,
            full_frame_len: (DATA_HEADER_LEN + link.pkt_len + CRC_LEN) as u32,
            network_enabled: false,
            next_packet: 0,
            total_packets,
            pkt_len: link.pkt_len,
            delivered: Vec::new(),
        }
    }

    fn has_packets(&self) -> bool {
        self.next_packet < self.total_packets
    }
}

impl LinkPort for StationPort {
    fn get_packet(&mut self) -> Vec<u8> {
        let id = self.next_packet;
        self.next_packet += 1;
        let mut packet = vec![0u8; self.pkt_len.max(4)];
        packet[..4].copy_from_slice(&id.to_le_bytes());
        for (i, b) in packet.iter_mut().enumerate().skip(4) {
            *b = (id as usize + i) as u8;
        }
        packet.truncate(self.pkt_len);
        packet
    }

    fn put_packet(&mut self, packet: &[u8]) {
        self.delivered.push(packet.to_vec());
    }

    fn send_frame(&mut self, frame: &[u8]) {
        let tx = self.frame_time * frame.len() as u32 / self.full_frame_len;
        self.busy_until = self.busy_until.max(self.now) + tx;
        self.outbox.push((self.busy_until, frame.to_vec()));
    }

    /// The engine arms a data timer right after sending the frame, so the
    /// count starts when that frame has left the station.
    fn start_timer(&mut self, seq: u8, duration: Duration) {
        let departed = self.busy_until.max(self.now);
        self.timers.start(TimerKey::Data(seq), departed, duration);
    }

    fn stop_timer(&mut self, seq: u8) {
        self.timers.stop(TimerKey::Data(seq));
    }

    fn get_timer(&self, seq: u8) -> Option<Duration> {
        self.timers.remaining(TimerKey::Data(seq), self.now)
    }

    fn start_ack_timer(&mut self, duration: Duration) {
        self.timers.start(TimerKey::Ack, self.now, duration);
    }

    fn stop_ack_timer(&mut self) {
        self.timers.stop(TimerKey::Ack);
    }

    fn enable_network_layer(&mut self) {
        self.network_enabled = true;
    }

    fn disable_network_layer(&mut self) {
        self.network_enabled = false;
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Channel events waiting in virtual time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Wire {
    Arrive(Vec<u8>),
    Drained,
}

#[derive(Debug)]
struct Station {
    engine: Engine,
    port: StationPort,
}

/// Two stations joined by a lossy channel.
pub struct Simulator {
    config: SimulatorConfig,
    rng: StdRng,
    stations: [Station; 2],
    /// `(time, insertion order, destination station, event)`.
    wire: BinaryHeap<Reverse<(Duration, u64, usize, Wire)>>,
    order: u64,
    now: Duration,
}

impl Simulator {
    pub fn new(link: LinkConfig, config: SimulatorConfig) -> Result<Self, LinkError> {
        for (name, value) in [
            ("loss_rate", config.loss_rate),
            ("corrupt_rate", config.corrupt_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(LinkError::InvalidRate { name, value });
            }
        }
        let station = || -> Result<Station, LinkError> {
            Ok(Station {
                engine: Engine::new(link.clone())?,
                port: StationPort::new(config.packets, &link),
            })
        };
        let stations = [station()?, station()?];
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            stations,
            wire: BinaryHeap::new(),
            order: 0,
            now: Duration::ZERO,
        })
    }

    /// Run until both sides have every packet, the channel goes quiet, or
    /// the time limit passes.
    pub fn run(mut self) -> Result<SimReport, LinkError> {
        for id in 0..2 {
            let station = &mut self.stations[id];
            station.engine.start(&mut station.port);
            self.schedule(Duration::ZERO, id, Wire::Drained);
        }

        while !self.all_delivered() {
            // Network-layer events are immediate: they happen at `now`.
            if let Some(id) = (0..2).find(|&id| {
                let port = &self.stations[id].port;
                port.network_enabled && port.has_packets()
            }) {
                self.dispatch(id, Event::NetworkLayerReady)?;
                continue;
            }

            let Some((at, next)) = self.next_event() else {
                log::warn!("[sim] no pending events; stopping");
                break;
            };
            if at > self.config.time_limit {
                log::warn!("[sim] time limit {:?} reached", self.config.time_limit);
                break;
            }
            self.now = at;
            self.dispatch(next.0, next.1)?;
        }

        let [a, b] = self.stations;
        let report = SimReport {
            delivered_at_a: a.port.delivered,
            delivered_at_b: b.port.delivered,
            stats_a: a.engine.stats().clone(),
            stats_b: b.engine.stats().clone(),
            elapsed: self.now,
            packets: self.config.packets,
        };
        log::info!(
            "[sim] {:?}: A got {}/{}, B got {}/{}",
            report.elapsed,
            report.delivered_at_a.len(),
            report.packets,
            report.delivered_at_b.len(),
            report.packets
        );
        Ok(report)
    }

    fn all_delivered(&self) -> bool {
        let target = self.config.packets as usize;
        self.stations.iter().all(|s| s.port.delivered.len() >= target)
    }

    /// Pop the earliest channel event or expired timer.
    ///
    /// Channel events win ties so a frame arriving exactly at a deadline is
    /// seen before the timeout.
    fn next_event(&mut self) -> Option<(Duration, (usize, Event))> {
        self.discard_stale_drains();
        let wire_at = self.wire.peek().map(|Reverse((at, ..))| *at);
        let timer_at = (0..2)
            .filter_map(|id| {
                self.stations[id]
                    .port
                    .timers
                    .next_deadline()
                    .map(|at| (at, id))
            })
            .min();

        match (wire_at, timer_at) {
            (Some(w), Some((t, _))) if w <= t => self.pop_wire(),
            (Some(_), None) => self.pop_wire(),
            (_, Some((t, id))) => {
                let key = self.stations[id].port.timers.pop_expired(t)?;
                let event = match key {
                    TimerKey::Data(seq) => Event::DataTimeout(seq),
                    TimerKey::Ack => Event::AckTimeout,
                };
                Some((t, (id, event)))
            }
            (None, None) => None,
        }
    }

    /// Drop `Drained` markers overtaken by later transmissions; each of
    /// those scheduled its own marker at the new `busy_until`.
    fn discard_stale_drains(&mut self) {
        while let Some(Reverse((at, _, id, Wire::Drained))) = self.wire.peek() {
            if self.stations[*id].port.busy_until <= *at {
                break;
            }
            log::trace!("[sim] station {} still busy at {:?}", id, at);
            self.wire.pop();
        }
    }

    fn pop_wire(&mut self) -> Option<(Duration, (usize, Event))> {
        let Reverse((at, _, id, wire)) = self.wire.pop()?;
        let event = match wire {
            Wire::Arrive(bytes) => Event::FrameReceived(bytes),
            Wire::Drained => Event::PhysicalLayerReady,
        };
        Some((at, (id, event)))
    }

    fn dispatch(&mut self, id: usize, event: Event) -> Result<(), LinkError> {
        let now = self.now;
        let station = &mut self.stations[id];
        station.port.now = now;
        station.engine.handle(event, &mut station.port)?;

        let frames = std::mem::take(&mut station.port.outbox);
        if frames.is_empty() {
            return Ok(());
        }
        for (departed, frame) in frames {
            self.put_on_wire(id, departed, frame);
        }
        let drained = self.stations[id].port.busy_until;
        self.schedule(drained, id, Wire::Drained);
        Ok(())
    }

    /// Apply the fault model to a frame that left station `from` at
    /// `departed` and schedule its arrival.
    fn put_on_wire(&mut self, from: usize, departed: Duration, mut frame: Vec<u8>) {
        let arrival = departed + self.config.propagation;

        if self.rng.random_bool(self.config.loss_rate) {
            log::trace!("[sim] frame from {} lost", from);
            return;
        }
        if self.rng.random_bool(self.config.corrupt_rate) {
            let bit = self.rng.random_range(0..frame.len() * 8);
            frame[bit / 8] ^= 1 << (bit % 8);
            log::trace!("[sim] frame from {} corrupted at bit {}", from, bit);
        }
        self.schedule(arrival, 1 - from, Wire::Arrive(frame));
    }

    fn schedule(&mut self, at: Duration, to: usize, wire: Wire) {
        self.order += 1;
        self.wire.push(Reverse((at, self.order, to, wire)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_link() -> LinkConfig {
        LinkConfig {
            max_seq: 7,
            pkt_len: 32,
            ..LinkConfig::default()
        }
    }

    #[test]
    fn generated_packets_carry_their_id() {
        let link = LinkConfig {
            pkt_len: 16,
            ..LinkConfig::default()
        };
        let mut port = StationPort::new(3, &link);
        let p0 = port.get_packet();
        let p1 = port.get_packet();
        assert_eq!(p0.len(), 16);
        assert_eq!(packet_id(&p0), Some(0));
        assert_eq!(packet_id(&p1), Some(1));
        assert!(port.has_packets());
        port.get_packet();
        assert!(!port.has_packets());
    }

    #[test]
    fn perfect_channel_delivers_everything() {
        let sim = Simulator::new(
            small_link(),
            SimulatorConfig {
                packets: 50,
                ..SimulatorConfig::default()
            },
        )
        .unwrap();
        let report = sim.run().unwrap();
        assert!(report.is_complete());
        assert_eq!(report.stats_a.timeout_retransmits, 0);
        assert_eq!(report.stats_b.timeout_retransmits, 0);
        assert_eq!(report.stats_a.corrupt_received, 0);
    }

    #[test]
    fn same_seed_same_run() {
        let cfg = SimulatorConfig {
            packets: 40,
            loss_rate: 0.1,
            corrupt_rate: 0.1,
            seed: 7,
            ..SimulatorConfig::default()
        };
        let r1 = Simulator::new(small_link(), cfg.clone()).unwrap().run().unwrap();
        let r2 = Simulator::new(small_link(), cfg).unwrap().run().unwrap();
        assert_eq!(r1.elapsed, r2.elapsed);
        assert_eq!(r1.stats_a, r2.stats_a);
        assert_eq!(r1.stats_b, r2.stats_b);
    }

    #[test]
    fn data_timer_starts_when_frame_leaves() {
        let link = LinkConfig::default();
        let mut port = StationPort::new(1, &link);
        let full = vec![0u8; port.full_frame_len as usize];

        // Two full frames queue back to back; the second leaves at 2 × frame_time.
        port.send_frame(&full);
        port.send_frame(&full);
        port.start_timer(1, link.data_timer);

        assert_eq!(port.outbox[0].0, link.frame_time);
        assert_eq!(port.outbox[1].0, link.frame_time * 2);
        assert_eq!(
            port.get_timer(1),
            Some(link.frame_time * 2 + link.data_timer)
        );
    }

    #[test]
    fn overtaken_drain_marker_is_skipped() {
        let mut sim = Simulator::new(small_link(), SimulatorConfig::default()).unwrap();
        sim.schedule(Duration::from_millis(5), 0, Wire::Drained);
        sim.stations[0].port.busy_until = Duration::from_millis(10);
        sim.schedule(Duration::from_millis(10), 0, Wire::Drained);

        assert_eq!(
            sim.next_event(),
            Some((Duration::from_millis(10), (0, Event::PhysicalLayerReady)))
        );
        assert_eq!(sim.next_event(), None);
    }

    #[test]
    fn rejects_rates_outside_unit_interval() {
        let cfg = SimulatorConfig {
            corrupt_rate: 1.5,
            ..SimulatorConfig::default()
        };
        let err = Simulator::new(small_link(), cfg).err().unwrap();
        assert!(matches!(
            err,
            LinkError::InvalidRate {
                name: "corrupt_rate",
                ..
            }
        ));
    }

    #[test]
    fn report_detects_gaps() {
        let report = SimReport {
            delivered_at_a: vec![0u32.to_le_bytes().to_vec(), 2u32.to_le_bytes().to_vec()],
            delivered_at_b: vec![0u32.to_le_bytes().to_vec(), 1u32.to_le_bytes().to_vec()],
            stats_a: LinkStats::default(),
            stats_b: LinkStats::default(),
            elapsed: Duration::ZERO,
            packets: 2,
        };
        assert!(!report.is_complete());
    }
}
