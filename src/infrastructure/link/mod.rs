//! Command link.
//!
//! Owns the lifecycle of a single logical connection to the vehicle:
//!
//! ```text
//!           start()                transport: connected
//!   Idle ───────────► Listening ─────────────────────────► Connected
//!    ▲ ▲                  │                                   │
//!    │ │   request_connect(peer)                              │
//!    │ └──────────────► Connecting ──────────────────────────►│
//!    │                      │       transport: connected      │
//!    │   connect failed /   │                                 │
//!    └──────────────────────┴─── stop() / session lost ◄──────┘
//! ```
//!
//! The machine runs on a dedicated thread with its own runtime; the UI
//! talks to it through a [`LinkHandle`] and observes its state through a
//! shared mirror, so no call from the UI context ever blocks on I/O.

pub mod tcp;
pub mod transport;

use crate::domain::models::{AppEvent, LinkCommand, LinkState, MessageSeverity, Peer, StatusMessage};
use crate::infrastructure::link::tcp::TcpTransport;
use crate::infrastructure::link::transport::{Generation, Transport, TransportEvent};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Errors the link surfaces to its callers and the UI.
///
/// None of these are fatal; every failure degrades to "not connected" and a
/// fresh connect request recovers.
#[derive(Debug, Error)]
pub enum LinkError {
    /// A write was attempted while no session is established. The command
    /// is dropped; the caller may check state or just retry once connected.
    #[error("not connected")]
    NotConnected,
    /// The transport could not establish a session.
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    /// An established session terminated.
    #[error("connection lost: {0}")]
    SessionLost(String),
}

#[derive(Debug)]
struct SharedLink {
    state: LinkState,
    peer: Option<Peer>,
}

/// Read-only view of the link state, safe to consult from any context.
///
/// The machine publishes each transition here before emitting its lifecycle
/// event, so an observed state never runs ahead of the event stream.
#[derive(Clone)]
pub struct LinkObserver {
    shared: Arc<Mutex<SharedLink>>,
}

impl LinkObserver {
    fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(SharedLink {
                state: LinkState::Idle,
                peer: None,
            })),
        }
    }

    pub fn state(&self) -> LinkState {
        self.shared.lock().expect("link state poisoned").state
    }

    pub fn peer(&self) -> Option<Peer> {
        self.shared.lock().expect("link state poisoned").peer.clone()
    }
}

/// The connection lifecycle state machine.
///
/// All mutation happens on the link driver context; the UI reaches it via
/// [`LinkHandle`] messages. Transport events are tagged with the session
/// generation they belong to and discarded when stale.
pub struct LinkStateMachine<T: Transport> {
    transport: T,
    observer: LinkObserver,
    event_tx: mpsc::UnboundedSender<AppEvent>,
    generation: Generation,
}

impl<T: Transport> LinkStateMachine<T> {
    pub fn new(transport: T, event_tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            transport,
            observer: LinkObserver::new(),
            event_tx,
            generation: 0,
        }
    }

    pub fn observer(&self) -> LinkObserver {
        self.observer.clone()
    }

    pub fn current_state(&self) -> LinkState {
        self.observer.state()
    }

    pub fn handle_command(&mut self, command: LinkCommand) {
        match command {
            LinkCommand::Start => self.start(),
            LinkCommand::Stop => self.stop(),
            LinkCommand::Connect(peer) => self.request_connect(peer),
            LinkCommand::Write(bytes) => {
                if let Err(err) = self.write(bytes) {
                    debug!(%err, "write dropped");
                }
            }
        }
    }

    /// Begin accepting an inbound connection. Only meaningful while Idle;
    /// anywhere else a session or attempt is already active.
    pub fn start(&mut self) {
        if self.current_state() != LinkState::Idle {
            debug!(state = ?self.current_state(), "start ignored, session already active");
            return;
        }
        self.generation += 1;
        match self.transport.begin_listening(self.generation) {
            Ok(()) => self.transition(LinkState::Listening, None),
            Err(err) => {
                error!(%err, "failed to start listening");
                self.report(
                    format!("Cannot listen: {err}"),
                    MessageSeverity::Error,
                );
            }
        }
    }

    /// Initiate an outbound attempt, tearing down any existing session or
    /// in-flight accept first.
    pub fn request_connect(&mut self, peer: Peer) {
        // Stop semantics for an established session; a pending listen or
        // attempt is cancelled without bouncing through an Idle event.
        if self.current_state() == LinkState::Connected {
            self.stop();
        } else {
            self.transport.close();
        }
        self.generation += 1;
        info!(peer = %peer.address, "connecting");
        match self.transport.begin_connecting(self.generation, &peer) {
            Ok(()) => self.transition(LinkState::Connecting, None),
            Err(err) => {
                self.report(
                    LinkError::ConnectFailed(err.to_string()).to_string(),
                    MessageSeverity::Error,
                );
                if self.current_state() != LinkState::Idle {
                    self.transition(LinkState::Idle, None);
                }
            }
        }
    }

    /// Drive the machine to Idle, tearing down whatever is in flight.
    /// Events still queued from the old session become stale and are
    /// discarded on arrival.
    pub fn stop(&mut self) {
        self.transport.close();
        self.generation += 1;
        if self.current_state() != LinkState::Idle {
            self.transition(LinkState::Idle, None);
        }
    }

    /// Hand bytes to the transport. Rejected while not connected; the
    /// command is dropped, not queued.
    pub fn write(&mut self, bytes: Vec<u8>) -> Result<(), LinkError> {
        if self.current_state() != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }
        self.transport.send(bytes).map_err(|err| {
            warn!(%err, "transport rejected write");
            LinkError::NotConnected
        })
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        if event.generation() != self.generation {
            trace!(generation = event.generation(), "discarding stale transport event");
            return;
        }
        match event {
            TransportEvent::Connected { peer, .. } => {
                info!(peer = %peer.address, "connected");
                self.report(
                    format!("Connected to {}", peer.display_name),
                    MessageSeverity::Success,
                );
                self.transition(LinkState::Connected, Some(peer));
            }
            TransportEvent::ConnectFailed { reason, .. } => {
                self.transport.close();
                self.generation += 1;
                warn!(%reason, "connect failed");
                self.report(
                    LinkError::ConnectFailed(reason).to_string(),
                    MessageSeverity::Warning,
                );
                self.transition(LinkState::Idle, None);
            }
            TransportEvent::Disconnected { reason, .. } => {
                self.transport.close();
                self.generation += 1;
                warn!(%reason, "session lost");
                self.report(
                    LinkError::SessionLost(reason).to_string(),
                    MessageSeverity::Warning,
                );
                self.transition(LinkState::Idle, None);
            }
            TransportEvent::BytesReceived { bytes, .. } => {
                let _ = self.event_tx.send(AppEvent::DataReceived(bytes));
            }
        }
    }

    // The mirror is updated before the lifecycle event is emitted, so a
    // state read never observes a transition the event stream has not seen.
    fn transition(&mut self, state: LinkState, peer: Option<Peer>) {
        {
            let mut shared = self.observer.shared.lock().expect("link state poisoned");
            shared.state = state;
            shared.peer = peer.clone();
        }
        debug!(?state, "link state changed");
        let _ = self.event_tx.send(AppEvent::LinkState { state, peer });
    }

    fn report(&self, message: String, severity: MessageSeverity) {
        let _ = self
            .event_tx
            .send(AppEvent::LogMessage(StatusMessage { message, severity }));
    }
}

/// UI-side handle to the link driver. Cloneable; all methods are
/// fire-and-forget into the driver's command channel.
#[derive(Clone)]
pub struct LinkHandle {
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    observer: LinkObserver,
}

impl LinkHandle {
    pub fn start(&self) {
        let _ = self.command_tx.send(LinkCommand::Start);
    }

    pub fn stop(&self) {
        let _ = self.command_tx.send(LinkCommand::Stop);
    }

    pub fn request_connect(&self, peer: Peer) {
        let _ = self.command_tx.send(LinkCommand::Connect(peer));
    }

    /// Queue bytes for transmission. Rejected up front when the link is
    /// observably not connected; a race with a concurrent teardown is
    /// resolved by the driver, which drops rather than misdelivers.
    pub fn write(&self, bytes: Vec<u8>) -> Result<(), LinkError> {
        if self.state() != LinkState::Connected {
            return Err(LinkError::NotConnected);
        }
        self.command_tx
            .send(LinkCommand::Write(bytes))
            .map_err(|_| LinkError::NotConnected)
    }

    pub fn state(&self) -> LinkState {
        self.observer.state()
    }

    pub fn peer(&self) -> Option<Peer> {
        self.observer.peer()
    }
}

/// Spawn the link driver on a dedicated thread with its own runtime.
///
/// Commands flow in over the returned handle, lifecycle and data events
/// flow out over `event_tx`, and the TCP transport's tasks live on the
/// driver's runtime.
pub fn spawn(event_tx: mpsc::UnboundedSender<AppEvent>, listen_addr: String) -> LinkHandle {
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let (handle_tx, handle_rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create tokio runtime for the link");

        rt.block_on(async move {
            let (transport_tx, mut transport_rx) = mpsc::unbounded_channel();
            let transport = TcpTransport::new(transport_tx, listen_addr);
            let mut machine = LinkStateMachine::new(transport, event_tx);
            let _ = handle_tx.send(machine.observer());

            loop {
                tokio::select! {
                    command = command_rx.recv() => match command {
                        Some(command) => machine.handle_command(command),
                        // UI dropped the handle; tear down and exit.
                        None => break,
                    },
                    Some(event) = transport_rx.recv() => machine.handle_transport_event(event),
                }
            }
            machine.stop();
        });
    });

    let observer = handle_rx
        .recv()
        .expect("link driver exited before publishing its observer");

    LinkHandle {
        command_tx,
        observer,
    }
}
