//! Protocol engine: selective repeat with piggybacked ACKs and NAKs.
//!
//! # Architecture
//!
//! ```text
//!        Event (one at a time)
//!              │
//!  ┌───────────▼──────────────────────────────┐
//!  │                 Engine                   │
//!  │  ├── SendWindow  (outstanding frames)    │
//!  │  ├── RecvWindow  (reassembly, NAK pick)  │
//!  │  └── AckQueue    (acks awaiting a ride)  │
//!  └───────────┬──────────────────────────────┘
//!              │ send_frame / timers / put_packet / gate
//!          LinkPort
//! ```
//!
//! The engine is purely reactive.  Each [`Event`] is processed to
//! completion, then the network-layer gate is re-evaluated: new packets are
//! admitted only while the send window has room **and** the physical layer
//! has signalled it can take another frame.
//!
//! Every fault on the channel is absorbed here.  Corrupted frames trigger a
//! NAK, stray numbers are ignored, duplicates are re-acknowledged, and lost
//! frames are recovered by their retransmission timers.

use tokio::sync::mpsc;

use crate::ack_queue::AckQueue;
use crate::config::LinkConfig;
use crate::error::{ConfigError, LinkError};
use crate::frame::{Frame, FrameKind};
use crate::port::{Event, LinkPort};
use crate::recv_window::{DataOutcome, RecvWindow};
use crate::send_window::SendWindow;
use crate::seq::SeqSpace;

// ---------------------------------------------------------------------------
// LinkStats
// ---------------------------------------------------------------------------

/// Running counters for one engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Every frame handed to the physical layer.
    pub frames_sent: u64,
    /// Data frames, first transmissions and retransmissions alike.
    pub data_frames_sent: u64,
    pub timeout_retransmits: u64,
    pub nak_retransmits: u64,
    pub acks_sent: u64,
    pub naks_sent: u64,
    /// Acknowledgements that rode on a data frame instead.
    pub piggybacked_acks: u64,
    pub corrupt_received: u64,
    pub duplicates_received: u64,
    pub stale_naks: u64,
    pub packets_delivered: u64,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Complete protocol state of one station.
#[derive(Debug)]
pub struct Engine {
    config: LinkConfig,
    space: SeqSpace,
    sender: SendWindow,
    receiver: RecvWindow,
    acks: AckQueue,
    /// The physical layer accepts another frame without queueing.
    phl_ready: bool,
    stats: LinkStats,
}

impl Engine {
    pub fn new(config: LinkConfig) -> Result<Self, ConfigError> {
        let space = config.validate()?;
        Ok(Self {
            sender: SendWindow::new(space),
            receiver: RecvWindow::new(space),
            acks: AckQueue::new(space.window_size()),
            space,
            config,
            phl_ready: false,
            stats: LinkStats::default(),
        })
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn space(&self) -> SeqSpace {
        self.space
    }

    pub fn send_window(&self) -> &SendWindow {
        &self.sender
    }

    pub fn recv_window(&self) -> &RecvWindow {
        &self.receiver
    }

    /// Acknowledgements still waiting for a data frame or the ACK timer.
    pub fn pending_acks(&self) -> usize {
        self.acks.len()
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// Put the network-layer gate in its initial (closed) state.
    pub fn start<P: LinkPort>(&mut self, port: &mut P) {
        self.update_gate(port);
    }

    /// Process one event to completion, then re-evaluate the gate.
    ///
    /// Only a network layer that hands over an oversized packet produces an
    /// `Err`; channel faults are always recovered internally.
    pub fn handle<P: LinkPort>(&mut self, event: Event, port: &mut P) -> Result<(), LinkError> {
        let result = match event {
            Event::NetworkLayerReady => self.on_network_ready(port),
            Event::PhysicalLayerReady => {
                self.phl_ready = true;
                Ok(())
            }
            Event::FrameReceived(bytes) => {
                self.on_frame(&bytes, port);
                Ok(())
            }
            Event::DataTimeout(seq) => {
                self.on_data_timeout(seq, port);
                Ok(())
            }
            Event::AckTimeout => {
                self.on_ack_timeout(port);
                Ok(())
            }
        };
        self.update_gate(port);
        result
    }

    /// Reactive loop: handle events until the source closes.
    ///
    /// Returns the engine so the caller can inspect its final state.
    pub async fn run<P: LinkPort>(
        mut self,
        mut events: mpsc::Receiver<Event>,
        port: &mut P,
    ) -> Result<Self, LinkError> {
        self.start(port);
        while let Some(event) = events.recv().await {
            self.handle(event, port)?;
        }
        log::debug!("[dl] event source closed");
        Ok(self)
    }

    // -----------------------------------------------------------------------
    // Sender side
    // -----------------------------------------------------------------------

    fn on_network_ready<P: LinkPort>(&mut self, port: &mut P) -> Result<(), LinkError> {
        if !self.sender.can_admit() {
            log::debug!("[dl] network layer ready but send window is full");
            return Ok(());
        }
        let packet = port.get_packet();
        if packet.len() > self.config.pkt_len {
            return Err(LinkError::PacketTooLarge {
                len: packet.len(),
                max: self.config.pkt_len,
            });
        }
        let seq = self.sender.admit(packet);
        self.send_data_frame(seq, port);
        Ok(())
    }

    /// Transmit the stored frame `seq`, piggybacking the oldest pending ack.
    fn send_data_frame<P: LinkPort>(&mut self, seq: u8, port: &mut P) {
        let Some(payload) = self.sender.frame(seq).map(<[u8]>::to_vec) else {
            log::error!("[dl] no outstanding frame {seq} to transmit");
            return;
        };

        let ack = match self.acks.pop() {
            Some(ack) => {
                self.stats.piggybacked_acks += 1;
                if self.acks.is_empty() {
                    port.stop_ack_timer();
                }
                ack
            }
            None => self.space.no_ack(),
        };

        log::debug!(
            "[dl] → DATA seq={} ack={} len={} outstanding={}",
            seq,
            ack,
            payload.len(),
            self.sender.outstanding()
        );
        self.transmit(&Frame::data(seq, ack, payload), port);
        self.stats.data_frames_sent += 1;
        port.start_timer(seq, self.config.data_timer);
    }

    fn on_ack<P: LinkPort>(&mut self, seq: u8, port: &mut P) {
        if !self.space.is_valid(seq) {
            log::warn!(
                "[dl] bad ack number {seq}, expected at most {}",
                self.space.max_seq()
            );
            return;
        }
        match self.sender.handle_ack(seq) {
            Some(outcome) => {
                port.stop_timer(seq);
                log::debug!(
                    "[dl] ← ACK {} (slid {}, oldest={})",
                    seq,
                    outcome.collapsed,
                    self.sender.oldest_frame_id()
                );
            }
            None => log::debug!("[dl] ← ACK {seq} ignored (not awaiting it)"),
        }
    }

    /// Resend a NAKed frame unless a resend is already on its way.
    fn on_nak<P: LinkPort>(&mut self, seq: u8, port: &mut P) {
        if !self.sender.is_pending(seq) {
            self.stats.stale_naks += 1;
            log::debug!("[dl] ← NAK {seq} ignored (not outstanding)");
            return;
        }
        match port.get_timer(seq) {
            Some(remaining) if remaining > self.config.nak_threshold() => {
                log::debug!("[dl] ← NAK {seq}; resending ({remaining:?} left on timer)");
                self.sender.record_retransmit(seq);
                self.stats.nak_retransmits += 1;
                self.send_data_frame(seq, port);
            }
            remaining => {
                self.stats.stale_naks += 1;
                log::debug!("[dl] ← NAK {seq} ignored (timer {remaining:?})");
            }
        }
    }

    fn on_data_timeout<P: LinkPort>(&mut self, seq: u8, port: &mut P) {
        if !self.sender.is_pending(seq) {
            debug_assert!(false, "data timer fired for frame {seq} that is not pending");
            log::error!("[dl] data timer fired for frame {seq} that is not pending");
            return;
        }
        log::debug!("[dl] ---- DATA {seq} timeout");
        self.sender.record_retransmit(seq);
        self.stats.timeout_retransmits += 1;
        self.send_data_frame(seq, port);
    }

    // -----------------------------------------------------------------------
    // Receiver side
    // -----------------------------------------------------------------------

    fn on_frame<P: LinkPort>(&mut self, bytes: &[u8], port: &mut P) {
        let frame = match Frame::decode(bytes) {
            Ok(frame) => frame,
            Err(e) => {
                self.on_corrupt(&e.to_string(), port);
                return;
            }
        };
        if frame.kind == FrameKind::Data && frame.payload.len() > self.config.pkt_len {
            let reason = format!("oversized payload of {} bytes", frame.payload.len());
            self.on_corrupt(&reason, port);
            return;
        }

        match frame.kind {
            FrameKind::Ack => self.on_ack(frame.ack, port),
            FrameKind::Nak => self.on_nak(frame.ack, port),
            FrameKind::Data => {
                let piggyback = frame.ack;
                self.on_data(frame.seq, frame.payload, port);
                if piggyback != self.space.no_ack() {
                    self.on_ack(piggyback, port);
                }
            }
        }
    }

    fn on_data<P: LinkPort>(&mut self, seq: u8, payload: Vec<u8>, port: &mut P) {
        match self.receiver.on_data_frame(seq, payload) {
            DataOutcome::Accepted { delivered } => {
                log::debug!(
                    "[dl] ← DATA {} accepted; delivering {} (front={})",
                    seq,
                    delivered.len(),
                    self.receiver.front()
                );
                self.enqueue_ack(seq, port);
                for packet in delivered {
                    port.put_packet(&packet);
                    self.stats.packets_delivered += 1;
                }
            }
            DataOutcome::Duplicate => {
                self.stats.duplicates_received += 1;
                log::debug!("[dl] ← DATA {seq} duplicate or outside window");
                if self.space.is_valid(seq) {
                    self.send_ack(seq, port);
                }
            }
        }
    }

    /// Queue an ack for piggybacking, arming the ACK timer on the first one.
    fn enqueue_ack<P: LinkPort>(&mut self, seq: u8, port: &mut P) {
        let was_empty = self.acks.is_empty();
        if let Some(evicted) = self.acks.push(seq) {
            self.send_ack(evicted, port);
        }
        if was_empty {
            port.start_ack_timer(self.config.ack_timer);
        }
    }

    fn on_corrupt<P: LinkPort>(&mut self, reason: &str, port: &mut P) {
        self.stats.corrupt_received += 1;
        log::debug!("[dl] **** receiver error: {reason}");
        match self.receiver.choose_nak() {
            Some(seq) => {
                log::debug!("[dl] → NAK {seq}");
                self.transmit(&Frame::nak(seq), port);
                self.stats.naks_sent += 1;
            }
            None => log::debug!("[dl] nothing missing to NAK"),
        }
    }

    fn on_ack_timeout<P: LinkPort>(&mut self, port: &mut P) {
        while let Some(seq) = self.acks.pop() {
            self.send_ack(seq, port);
        }
    }

    fn send_ack<P: LinkPort>(&mut self, seq: u8, port: &mut P) {
        log::debug!("[dl] → ACK {seq}");
        self.transmit(&Frame::ack(seq), port);
        self.stats.acks_sent += 1;
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn transmit<P: LinkPort>(&mut self, frame: &Frame, port: &mut P) {
        port.send_frame(&frame.encode());
        self.phl_ready = false;
        self.stats.frames_sent += 1;
    }

    fn update_gate<P: LinkPort>(&self, port: &mut P) {
        if self.sender.can_admit() && self.phl_ready {
            port.enable_network_layer();
        } else {
            port.disable_network_layer();
        }
    }
}
