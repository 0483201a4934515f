//! The engine's view of its surroundings.
//!
//! Everything outside the protocol (physical channel, scheduler, network
//! layer) is reached through [`LinkPort`] and reports back as an [`Event`].
//! The engine never blocks inside a port call; the only wait is for the
//! next event.

use std::time::Duration;

/// One input to [`crate::engine::Engine::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The network layer has a packet waiting (only while enabled).
    NetworkLayerReady,
    /// The physical layer can take another frame.
    PhysicalLayerReady,
    /// A frame came off the channel.  The bytes may be corrupted.
    FrameReceived(Vec<u8>),
    /// The retransmission timer of this sequence number expired.
    DataTimeout(u8),
    /// The ACK coalescing timer expired.
    AckTimeout,
}

/// Services one station provides to its protocol engine.
pub trait LinkPort {
    /// Take the next outbound packet from the network layer.
    fn get_packet(&mut self) -> Vec<u8>;

    /// Hand an in-order packet up to the network layer.
    fn put_packet(&mut self, packet: &[u8]);

    /// Put an encoded frame on the channel.
    fn send_frame(&mut self, frame: &[u8]);

    /// (Re)arm the retransmission timer of `seq`.
    fn start_timer(&mut self, seq: u8, duration: Duration);

    fn stop_timer(&mut self, seq: u8);

    /// Time left on the retransmission timer of `seq`, `None` if not running.
    fn get_timer(&self, seq: u8) -> Option<Duration>;

    /// (Re)arm the ACK coalescing timer.
    fn start_ack_timer(&mut self, duration: Duration);

    fn stop_ack_timer(&mut self);

    /// Allow [`Event::NetworkLayerReady`] to be generated.
    fn enable_network_layer(&mut self);

    fn disable_network_layer(&mut self);
}
