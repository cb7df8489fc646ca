//! In-memory mesh transport for development and tests

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};

use super::{Contact, Destination, MeshTransport, SelfInfo, TransportEvent};
use crate::{Error, Result};

/// Mock transport that records sends and lets tests inject events
///
/// Sends succeed unless a failure budget is armed with
/// [`MockTransport::fail_next_sends`]; each armed failure consumes one
/// send attempt, mirroring a transient radio error.
#[derive(Clone)]
pub struct MockTransport {
    connected: Arc<AtomicBool>,
    sent: Arc<Mutex<Vec<(Destination, String)>>>,
    failures: Arc<Mutex<VecDeque<()>>>,
    event_tx: Option<mpsc::Sender<TransportEvent>>,
    contacts: Arc<Mutex<Vec<Contact>>>,
}

impl MockTransport {
    /// Create a mock transport with a couple of seeded contacts
    #[must_use]
    pub fn new() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(false)),
            sent: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(VecDeque::new())),
            event_tx: None,
            contacts: Arc::new(Mutex::new(vec![
                Contact {
                    public_key: "node1".to_string(),
                    name: Some("TestNode1".to_string()),
                    last_seen: None,
                    is_online: true,
                },
                Contact {
                    public_key: "node2".to_string(),
                    name: Some("TestNode2".to_string()),
                    last_seen: None,
                    is_online: true,
                },
            ])),
        }
    }

    /// Create with an event receiver for the daemon loop
    #[must_use]
    pub fn with_receiver() -> (Self, mpsc::Receiver<TransportEvent>) {
        let (tx, rx) = mpsc::channel(100);
        let mut transport = Self::new();
        transport.event_tx = Some(tx);
        (transport, rx)
    }

    /// Inject an inbound event, as if the radio produced it
    ///
    /// # Errors
    ///
    /// Returns error if no receiver is attached or it was dropped
    pub async fn inject(&self, event: TransportEvent) -> Result<()> {
        let tx = self
            .event_tx
            .as_ref()
            .ok_or_else(|| Error::Transport("mock has no event receiver".to_string()))?;
        tx.send(event)
            .await
            .map_err(|_| Error::Transport("mock event receiver dropped".to_string()))
    }

    /// Arm the next `n` sends to fail with a transient error
    pub async fn fail_next_sends(&self, n: usize) {
        let mut failures = self.failures.lock().await;
        for _ in 0..n {
            failures.push_back(());
        }
    }

    /// Everything successfully sent so far, in order
    pub async fn sent_messages(&self) -> Vec<(Destination, String)> {
        self.sent.lock().await.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeshTransport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&mut self) -> Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("mock transport connected");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!("mock transport disconnected");
        Ok(())
    }

    async fn send(&self, destination: &Destination, text: &str) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        if self.failures.lock().await.pop_front().is_some() {
            return Err(Error::Transport("mock send failure".to_string()));
        }
        tracing::debug!(%destination, text, "mock send");
        self.sent
            .lock()
            .await
            .push((destination.clone(), text.to_string()));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        Ok(self.contacts.lock().await.clone())
    }

    async fn ping(&self, destination: &Destination) -> Result<bool> {
        let Destination::Node(key) = destination else {
            return Ok(false);
        };
        let contacts = self.contacts.lock().await;
        Ok(contacts.iter().any(|c| c.public_key.starts_with(key.as_str())))
    }

    async fn self_info(&self) -> Result<SelfInfo> {
        Ok(SelfInfo {
            public_key: Some("meshbot-mock-key".to_string()),
            node_name: Some("MeshBot".to_string()),
        })
    }
}
