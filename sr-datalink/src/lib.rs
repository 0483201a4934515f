//! `sr-datalink`: a selective-repeat data link over an unreliable channel.
//!
//! # Architecture
//!
//! ```text
//!   network layer                         network layer
//!        │ get_packet / put_packet              ▲
//!  ┌─────▼──────────────────────────────────────┴─────┐
//!  │                     Engine                       │
//!  │  SendWindow ── retransmit timers, NAK guard      │
//!  │  RecvWindow ── reassembly, NAK selection         │
//!  │  AckQueue   ── piggyback / ACK timer flush       │
//!  └─────┬──────────────────────────────────────▲─────┘
//!        │ send_frame                 FrameReceived │
//!  ┌─────▼──────────────────────────────────────┴─────┐
//!  │      physical channel (lossy, corrupting)        │
//!  └──────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`seq`]          modular sequence arithmetic
//! - [`frame`]        wire format and checksum
//! - [`send_window`]  outstanding frames, selective acks
//! - [`recv_window`]  out-of-order buffering, in-order delivery, NAK choice
//! - [`ack_queue`]    acknowledgements waiting for a piggyback
//! - [`timer`]        keyed deadline queue
//! - [`port`]         events in, collaborator calls out
//! - [`engine`]       event dispatch and the network-layer gate
//! - [`simulator`]    seeded two-station channel simulation
//! - [`config`]       link parameters
//! - [`error`]        error types

pub mod ack_queue;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod port;
pub mod recv_window;
pub mod send_window;
pub mod seq;
pub mod simulator;
pub mod timer;

pub use config::LinkConfig;
pub use engine::{Engine, LinkStats};
pub use error::{ConfigError, FrameError, LinkError};
pub use port::{Event, LinkPort};
