//! TCP byte-stream transport.
//!
//! Carries the command stream over a plain socket, which pairs naturally
//! with serial-over-TCP bridges on the vehicle side. Listening accepts
//! exactly one peer; connecting dials one. An established session runs a
//! single task that multiplexes socket reads against the outbound write
//! queue.

use crate::domain::models::Peer;
use crate::infrastructure::link::transport::{Generation, Transport, TransportEvent};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct TcpTransport {
    listen_addr: String,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    /// Outbound queue of the active session, if any.
    write_tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
    /// In-flight accept/connect/session tasks; aborted on close.
    tasks: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl TcpTransport {
    /// Must be created on the runtime that will own the spawned tasks.
    pub fn new(event_tx: mpsc::UnboundedSender<TransportEvent>, listen_addr: String) -> Self {
        Self {
            listen_addr,
            event_tx,
            write_tx: None,
            tasks: Vec::new(),
            local_addr: None,
        }
    }

    /// Address actually bound while listening. Resolves `:0` requests.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

impl Transport for TcpTransport {
    fn begin_listening(&mut self, generation: Generation) -> Result<()> {
        self.close();

        // Bind synchronously so an unusable listen address fails the call
        // instead of surfacing later as an event.
        let listener = std::net::TcpListener::bind(&self.listen_addr)
            .with_context(|| format!("bind {}", self.listen_addr))?;
        listener.set_nonblocking(true)?;
        self.local_addr = listener.local_addr().ok();
        info!(addr = %self.listen_addr, "listening for an inbound connection");

        let (write_tx, write_rx) = mpsc::unbounded_channel();
        self.write_tx = Some(write_tx);

        let events = self.event_tx.clone();
        self.tasks.push(tokio::spawn(async move {
            let listener = match TcpListener::from_std(listener) {
                Ok(listener) => listener,
                Err(err) => {
                    let _ = events.send(TransportEvent::ConnectFailed {
                        generation,
                        reason: err.to_string(),
                    });
                    return;
                }
            };
            match listener.accept().await {
                Ok((stream, remote)) => {
                    let _ = events.send(TransportEvent::Connected {
                        generation,
                        peer: Peer::new(remote.to_string()),
                    });
                    run_session(stream, generation, events, write_rx).await;
                }
                Err(err) => {
                    let _ = events.send(TransportEvent::ConnectFailed {
                        generation,
                        reason: err.to_string(),
                    });
                }
            }
        }));
        Ok(())
    }

    fn begin_connecting(&mut self, generation: Generation, peer: &Peer) -> Result<()> {
        self.close();

        let (write_tx, write_rx) = mpsc::unbounded_channel();
        self.write_tx = Some(write_tx);

        let events = self.event_tx.clone();
        let address = peer.address.clone();
        self.tasks.push(tokio::spawn(async move {
            match TcpStream::connect(&address).await {
                Ok(stream) => {
                    let peer = stream
                        .peer_addr()
                        .map(|addr| Peer::new(addr.to_string()))
                        .unwrap_or_else(|_| Peer::new(address));
                    let _ = events.send(TransportEvent::Connected { generation, peer });
                    run_session(stream, generation, events, write_rx).await;
                }
                Err(err) => {
                    let _ = events.send(TransportEvent::ConnectFailed {
                        generation,
                        reason: err.to_string(),
                    });
                }
            }
        }));
        Ok(())
    }

    fn send(&mut self, bytes: Vec<u8>) -> Result<()> {
        let write_tx = self
            .write_tx
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no active session"))?;
        write_tx
            .send(bytes)
            .map_err(|_| anyhow::anyhow!("session writer is gone"))
    }

    fn close(&mut self) {
        self.write_tx = None;
        self.local_addr = None;
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_session(
    stream: TcpStream,
    generation: Generation,
    events: mpsc::UnboundedSender<TransportEvent>,
    mut write_rx: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    // Commands are 7 bytes; Nagle would batch them.
    if let Err(err) = stream.set_nodelay(true) {
        debug!(%err, "set_nodelay failed");
    }

    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; 1024];
    loop {
        tokio::select! {
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    let _ = events.send(TransportEvent::Disconnected {
                        generation,
                        reason: "peer closed the connection".into(),
                    });
                    break;
                }
                Ok(n) => {
                    let _ = events.send(TransportEvent::BytesReceived {
                        generation,
                        bytes: buf[..n].to_vec(),
                    });
                }
                Err(err) => {
                    let _ = events.send(TransportEvent::Disconnected {
                        generation,
                        reason: err.to_string(),
                    });
                    break;
                }
            },
            queued = write_rx.recv() => match queued {
                Some(bytes) => {
                    if let Err(err) = writer.write_all(&bytes).await {
                        let _ = events.send(TransportEvent::Disconnected {
                            generation,
                            reason: err.to_string(),
                        });
                        break;
                    }
                }
                // The transport was closed; the task is aborted right after.
                None => break,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next_event(event_rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> TransportEvent {
        timeout(Duration::from_secs(5), event_rx.recv())
            .await
            .expect("timed out waiting for a transport event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_outbound_session_exchanges_bytes() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 7];
            stream.read_exact(&mut buf).unwrap();
            stream.write_all(b"ack").unwrap();
            buf
        });

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut transport = TcpTransport::new(event_tx, "127.0.0.1:0".into());
        transport
            .begin_connecting(1, &Peer::new(addr.to_string()))
            .unwrap();

        match next_event(&mut event_rx).await {
            TransportEvent::Connected { generation: 1, .. } => {}
            other => panic!("expected Connected, got {other:?}"),
        }

        transport.send(b"m+03-02".to_vec()).unwrap();
        match next_event(&mut event_rx).await {
            TransportEvent::BytesReceived { bytes, .. } => assert_eq!(bytes, b"ack"),
            other => panic!("expected BytesReceived, got {other:?}"),
        }

        assert_eq!(&server.join().unwrap(), b"m+03-02");
        transport.close();
    }

    #[tokio::test]
    async fn test_inbound_accept_reports_peer_and_data() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut transport = TcpTransport::new(event_tx, "127.0.0.1:0".into());
        transport.begin_listening(7).unwrap();
        let addr = transport.local_addr().expect("bound address");

        let client = std::thread::spawn(move || {
            let mut stream = std::net::TcpStream::connect(addr).unwrap();
            stream.write_all(b"hello").unwrap();
            stream
        });

        match next_event(&mut event_rx).await {
            TransportEvent::Connected { generation: 7, .. } => {}
            other => panic!("expected Connected, got {other:?}"),
        }
        match next_event(&mut event_rx).await {
            TransportEvent::BytesReceived { bytes, .. } => assert_eq!(bytes, b"hello"),
            other => panic!("expected BytesReceived, got {other:?}"),
        }

        drop(client.join().unwrap());
        transport.close();
    }

    #[tokio::test]
    async fn test_refused_connect_reports_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut transport = TcpTransport::new(event_tx, "127.0.0.1:0".into());
        transport
            .begin_connecting(3, &Peer::new(addr.to_string()))
            .unwrap();

        match next_event(&mut event_rx).await {
            TransportEvent::ConnectFailed { generation: 3, .. } => {}
            other => panic!("expected ConnectFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_taken_listen_address_fails_synchronously() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let mut transport = TcpTransport::new(event_tx, addr.to_string());
        assert!(transport.begin_listening(1).is_err());
    }

    #[tokio::test]
    async fn test_send_without_session_is_rejected() {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let mut transport = TcpTransport::new(event_tx, "127.0.0.1:0".into());
        assert!(transport.send(b"m+00+00".to_vec()).is_err());
    }
}
