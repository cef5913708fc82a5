use serde::{Deserialize, Serialize};

/// Lifecycle state of the command link.
///
/// Exactly one value is current at any time; it is owned by the link state
/// machine and mirrored for reads from the UI context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No session and no attempt in flight.
    Idle,
    /// Waiting for a single inbound connection.
    Listening,
    /// An outbound attempt is in flight.
    Connecting,
    /// A session is established; writes are accepted.
    Connected,
}

impl LinkState {
    /// Status line shown in the UI header.
    pub fn label(&self, peer: Option<&Peer>) -> String {
        match self {
            LinkState::Idle | LinkState::Listening => "not connected".to_string(),
            LinkState::Connecting => "connecting…".to_string(),
            LinkState::Connected => match peer {
                Some(peer) => format!("connected to {}", peer.display_name),
                None => "connected".to_string(),
            },
        }
    }
}

/// A remote endpoint the link can dial or accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Transport address, e.g. `192.168.4.1:7070`.
    pub address: String,
    /// Name shown in the status line; defaults to the address.
    pub display_name: String,
}

impl Peer {
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        Self {
            display_name: address.clone(),
            address,
        }
    }
}

/// A snapshot of both lever values at the moment of encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame {
    pub left: i16,
    pub right: i16,
}

/// One of the two motor channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Left,
    Right,
}

/// Events posted from the link context into the UI context.
///
/// Single-consumer: the UI drains these once per frame, so everything the
/// transport produced is applied in arrival order on one thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The link completed a state transition. `peer` is populated for
    /// [`LinkState::Connected`].
    LinkState {
        state: LinkState,
        peer: Option<Peer>,
    },
    /// Bytes arrived from the connected peer.
    DataReceived(Vec<u8>),
    /// Human-readable status line for the UI.
    LogMessage(StatusMessage),
}

/// Commands from the UI context to the link driver.
#[derive(Debug, Clone)]
pub enum LinkCommand {
    Start,
    Stop,
    Connect(Peer),
    Write(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels() {
        assert_eq!(LinkState::Idle.label(None), "not connected");
        assert_eq!(LinkState::Listening.label(None), "not connected");
        assert_eq!(LinkState::Connecting.label(None), "connecting…");
        let peer = Peer::new("10.0.0.7:7070");
        assert_eq!(
            LinkState::Connected.label(Some(&peer)),
            "connected to 10.0.0.7:7070"
        );
    }
}
