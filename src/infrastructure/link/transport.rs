//! Transport seam for the command link.
//!
//! The state machine drives a [`Transport`] and consumes the
//! [`TransportEvent`]s it emits over the driver's event channel. Anything
//! that can carry a byte stream and report session lifecycle fits behind
//! this trait, from a TCP socket to a Bluetooth serial port.

use crate::domain::models::Peer;
use anyhow::Result;

/// Session generation tag.
///
/// Every accept/connect attempt is issued under a fresh generation, and all
/// events produced by that attempt carry it. The state machine discards
/// events whose generation is stale, so a torn-down session can never leak
/// into the current one.
pub type Generation = u64;

#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A session was established, inbound or outbound.
    Connected { generation: Generation, peer: Peer },
    /// The attempt failed before a session existed.
    ConnectFailed {
        generation: Generation,
        reason: String,
    },
    /// An established session ended (peer disconnect or I/O error).
    Disconnected {
        generation: Generation,
        reason: String,
    },
    /// Bytes arrived on the established session, in arrival order.
    BytesReceived {
        generation: Generation,
        bytes: Vec<u8>,
    },
}

impl TransportEvent {
    pub fn generation(&self) -> Generation {
        match self {
            TransportEvent::Connected { generation, .. }
            | TransportEvent::ConnectFailed { generation, .. }
            | TransportEvent::Disconnected { generation, .. }
            | TransportEvent::BytesReceived { generation, .. } => *generation,
        }
    }
}

pub trait Transport: Send {
    /// Begin accepting a single inbound connection under `generation`.
    /// An immediate setup failure (e.g. the listen address is taken) is
    /// returned here; later outcomes arrive as events.
    fn begin_listening(&mut self, generation: Generation) -> Result<()>;

    /// Begin an outbound attempt to `peer` under `generation`.
    fn begin_connecting(&mut self, generation: Generation, peer: &Peer) -> Result<()>;

    /// Queue bytes for the established session. Only valid while connected;
    /// delivery is best-effort and failures surface as `Disconnected`.
    fn send(&mut self, bytes: Vec<u8>) -> Result<()>;

    /// Tear down any in-flight attempt or established session.
    fn close(&mut self);
}
