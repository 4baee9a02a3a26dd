//! In-memory links standing in for a trx-control WebSocket
//!
//! [`virtual_link`] creates a connected pair: a [`VirtualTransport`] for the
//! relay and a [`ServerEnd`] for the test playing the server. A
//! [`VirtualConnector`] hands out links according to a script, so tests can
//! refuse connections, accept them later and watch the retry timing.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;
use trx_relay::{ConnectError, Connector, Transport, TransportError};

use crate::radio::VirtualRadio;

/// What the server side pushes to the relay
#[derive(Debug)]
enum ServerFrame {
    Text(String),
    Close,
    Fail(ErrorKind),
}

/// What happens to sends once the allowance runs out
#[derive(Debug, Clone, Copy)]
enum SendFault {
    Fail,
    Stall,
}

/// Scripted send behaviour shared by both ends of a link
#[derive(Debug, Default)]
struct SendGate {
    fault: Option<(usize, SendFault)>,
}

impl SendGate {
    /// Fault for the next send, if its allowance is used up
    fn next(&mut self) -> Option<SendFault> {
        match &mut self.fault {
            Some((0, fault)) => Some(*fault),
            Some((allowed, _)) => {
                *allowed -= 1;
                None
            }
            None => None,
        }
    }
}

/// Create a connected relay/server pair
pub fn virtual_link() -> (VirtualTransport, ServerEnd) {
    let (to_server, from_client) = mpsc::unbounded_channel();
    let (to_client, from_server) = mpsc::unbounded_channel();
    let closed = Arc::new(AtomicBool::new(false));
    let gate = Arc::new(Mutex::new(SendGate::default()));

    let transport = VirtualTransport {
        to_server,
        from_server,
        closed: closed.clone(),
        gate: gate.clone(),
    };
    let server = ServerEnd {
        to_client,
        from_client,
        closed,
        gate,
    };
    (transport, server)
}

fn lock_gate(gate: &Mutex<SendGate>) -> MutexGuard<'_, SendGate> {
    gate.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Relay side of a virtual link
#[derive(Debug)]
pub struct VirtualTransport {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<ServerFrame>,
    closed: Arc<AtomicBool>,
    gate: Arc<Mutex<SendGate>>,
}

impl Transport for VirtualTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(std::io::Error::from(ErrorKind::NotConnected).into());
        }
        let fault = lock_gate(&self.gate).next();
        match fault {
            Some(SendFault::Fail) => {
                debug!("Virtual link failing send of {}", frame);
                return Err(std::io::Error::from(ErrorKind::BrokenPipe).into());
            }
            Some(SendFault::Stall) => std::future::pending::<()>().await,
            None => {}
        }
        self.to_server
            .send(frame)
            .map_err(|_| std::io::Error::from(ErrorKind::BrokenPipe).into())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.from_server.recv().await {
            Some(ServerFrame::Text(frame)) => Ok(Some(frame)),
            Some(ServerFrame::Close) | None => Ok(None),
            Some(ServerFrame::Fail(kind)) => Err(std::io::Error::from(kind).into()),
        }
    }

    async fn close(&mut self) {
        debug!("Virtual link closed by relay");
        self.closed.store(true, Ordering::SeqCst);
        self.from_server.close();
    }
}

/// Server side of a virtual link
#[derive(Debug)]
pub struct ServerEnd {
    to_client: mpsc::UnboundedSender<ServerFrame>,
    from_client: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
    gate: Arc<Mutex<SendGate>>,
}

impl ServerEnd {
    /// Push a text frame to the relay
    pub fn push(&self, frame: impl Into<String>) {
        let _ = self.to_client.send(ServerFrame::Text(frame.into()));
    }

    /// Push a radio's current state as a status update
    pub fn push_status(&self, radio: &VirtualRadio) {
        self.push(radio.status_frame());
    }

    /// Push every frame the radio has queued
    pub fn push_output(&self, radio: &mut VirtualRadio) {
        while let Some(frame) = radio.take_output() {
            self.push(frame);
        }
    }

    /// Acknowledge a batch of subscription requests
    pub fn ack(&self) {
        self.push(json!({ "status": "Ok", "reply": "start-status-updates" }).to_string());
    }

    /// Close the connection from the server side
    pub fn close(&self) {
        let _ = self.to_client.send(ServerFrame::Close);
    }

    /// Fail the connection with an I/O error
    pub fn fail(&self, kind: ErrorKind) {
        let _ = self.to_client.send(ServerFrame::Fail(kind));
    }

    /// Let the relay's next `allowed` sends through, then fail every send
    pub fn fail_sends_after(&self, allowed: usize) {
        lock_gate(&self.gate).fault = Some((allowed, SendFault::Fail));
    }

    /// Let the relay's next `allowed` sends through, then block every send
    ///
    /// A blocked send never completes, like a peer that stopped reading.
    pub fn stall_sends_after(&self, allowed: usize) {
        lock_gate(&self.gate).fault = Some((allowed, SendFault::Stall));
    }

    /// Wait for the next frame the relay sends
    ///
    /// Returns `None` once the relay side is gone.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Take a frame the relay already sent, without waiting
    pub fn try_sent(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Take every frame the relay already sent
    pub fn drain_sent(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.try_sent()).collect()
    }

    /// Whether the relay has closed its side
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A scripted connect result
#[derive(Debug)]
enum Planned {
    Refuse,
    Unreachable,
    Hang,
    Accept(VirtualTransport),
}

#[derive(Debug, Default)]
struct ConnectorState {
    plan: VecDeque<Planned>,
    attempts: Vec<Instant>,
}

/// Connector handing out virtual links according to a script
///
/// Attempts with nothing scripted are refused.
#[derive(Debug, Clone, Default)]
pub struct VirtualConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl VirtualConnector {
    /// Create a connector with an empty script
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next attempt
    pub fn refuse(&self) {
        self.lock().plan.push_back(Planned::Refuse);
    }

    /// Fail the next attempt as unreachable
    pub fn unreachable(&self) {
        self.lock().plan.push_back(Planned::Unreachable);
    }

    /// Never answer the next attempt
    pub fn hang(&self) {
        self.lock().plan.push_back(Planned::Hang);
    }

    /// Accept the next attempt, returning the server side of its link
    pub fn accept(&self) -> ServerEnd {
        let (transport, server) = virtual_link();
        self.lock().plan.push_back(Planned::Accept(transport));
        server
    }

    /// When each connect attempt was made
    pub fn attempts(&self) -> Vec<Instant> {
        self.lock().attempts.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ConnectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for VirtualConnector {
    type Transport = VirtualTransport;

    async fn connect(&mut self, uri: &str) -> Result<VirtualTransport, ConnectError> {
        let planned = {
            let mut state = self.lock();
            state.attempts.push(Instant::now());
            state.plan.pop_front()
        };

        match planned {
            Some(Planned::Accept(transport)) => Ok(transport),
            Some(Planned::Hang) => std::future::pending().await,
            Some(Planned::Unreachable) => Err(ConnectError::Unreachable {
                uri: uri.to_string(),
                reason: "no route to host".to_string(),
            }),
            Some(Planned::Refuse) | None => Err(ConnectError::Refused {
                uri: uri.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (mut transport, mut server) = virtual_link();

        transport.send("hello".to_string()).await.unwrap();
        assert_eq!(server.next_sent().await.as_deref(), Some("hello"));

        server.push("world");
        assert_eq!(transport.recv().await.unwrap().as_deref(), Some("world"));

        server.close();
        assert_eq!(transport.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failure_surfaces_as_transport_error() {
        let (mut transport, server) = virtual_link();
        server.fail(ErrorKind::ConnectionReset);
        assert!(matches!(
            transport.recv().await,
            Err(TransportError::Io(e)) if e.kind() == ErrorKind::ConnectionReset
        ));
    }

    #[tokio::test]
    async fn test_send_after_close_fails() {
        let (mut transport, server) = virtual_link();
        transport.close().await;
        assert!(server.is_closed());
        assert!(transport.send("late".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_sends_fail_after_allowance() {
        let (mut transport, mut server) = virtual_link();
        server.fail_sends_after(1);

        transport.send("first".to_string()).await.unwrap();
        assert!(matches!(
            transport.send("second".to_string()).await,
            Err(TransportError::Io(e)) if e.kind() == ErrorKind::BrokenPipe
        ));
        assert!(transport.send("third".to_string()).await.is_err());
        assert_eq!(server.drain_sent(), vec!["first".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_send_never_completes() {
        let (mut transport, mut server) = virtual_link();
        server.stall_sends_after(0);

        let send = transport.send("stuck".to_string());
        assert!(
            tokio::time::timeout(std::time::Duration::from_secs(60), send)
                .await
                .is_err()
        );
        assert!(server.try_sent().is_none());
    }

    #[tokio::test]
    async fn test_connector_follows_script() {
        let mut connector = VirtualConnector::new();
        connector.refuse();
        let _server = connector.accept();

        assert!(matches!(
            connector.connect("ws://sim").await,
            Err(ConnectError::Refused { .. })
        ));
        assert!(connector.connect("ws://sim").await.is_ok());
        // Script exhausted
        assert!(connector.connect("ws://sim").await.is_err());
        assert_eq!(connector.attempts().len(), 3);
    }
}
