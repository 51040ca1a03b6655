//! In-memory transport.
//!
//! A [`MemoryConnector`] hands every connection attempt to the paired
//! [`MemoryListener`], which plays the backend side. Used by tests and for
//! running the surface without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{Connector, Transport, TransportError};

pub fn memory_pair() -> (MemoryConnector, MemoryListener) {
    let (peers_tx, peers_rx) = mpsc::unbounded_channel();
    let attempts = Arc::new(AtomicUsize::new(0));
    let refuse = Arc::new(AtomicBool::new(false));
    (
        MemoryConnector {
            peers: peers_tx,
            attempts: attempts.clone(),
            refuse: refuse.clone(),
        },
        MemoryListener {
            peers: peers_rx,
            attempts,
            refuse,
        },
    )
}

pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn Transport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect(format!("{} refused", url)));
        }

        let (to_client, incoming) = mpsc::unbounded_channel();
        let (outgoing, from_client) = mpsc::unbounded_channel();
        self.peers
            .send(MemoryPeer {
                url: url.to_string(),
                to_client: Some(to_client),
                from_client,
            })
            .map_err(|_| TransportError::Connect("listener dropped".to_string()))?;

        Ok(Box::new(MemoryTransport {
            incoming,
            outgoing: Some(outgoing),
        }))
    }
}

/// Backend side of the in-memory connector.
pub struct MemoryListener {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
    attempts: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
}

impl MemoryListener {
    /// Waits for the next successful connection.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// A connection that has already been made, if any.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }

    /// Connection attempts so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

/// One accepted connection, seen from the backend.
pub struct MemoryPeer {
    pub url: String,
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// Pushes a frame to the client. Returns `false` once either side closed.
    pub fn push(&self, frame: impl Into<String>) -> bool {
        match &self.to_client {
            Some(tx) => tx.send(frame.into()).is_ok(),
            None => false,
        }
    }

    /// Next frame sent by the client; `None` after the client closed.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }

    /// Whether the client has closed its side.
    pub fn is_closed_by_client(&self) -> bool {
        self.from_client.is_closed()
    }

    /// Closes the connection from the backend side.
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

pub struct MemoryTransport {
    incoming: mpsc::UnboundedReceiver<String>,
    outgoing: Option<mpsc::UnboundedSender<String>>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        let Some(outgoing) = &self.outgoing else {
            return Err(TransportError::Send("closed".to_string()));
        };
        outgoing
            .send(text)
            .map_err(|_| TransportError::Send("peer gone".to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.outgoing = None;
        self.incoming.close();
    }
}
