//! TCP transport to a companion radio bridge
//!
//! The bridge owns the actual LoRa hardware and the mesh protocol; this
//! adapter only exchanges newline-delimited JSON frames with it.
//! Commands go out as `{"op": ...}` objects, traffic comes back as
//! `{"event": ...}` objects decoded into [`TransportEvent`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, RwLock, mpsc};

use super::{
    Contact, Destination, MeshMessage, MeshTransport, MessageKind, SelfInfo, TransportEvent,
};
use crate::{Error, Result};

/// How long [`TcpTransport::self_info`] waits for the bridge handshake
const SELF_INFO_WAIT: Duration = Duration::from_secs(2);

/// Inbound frame from the bridge
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum BridgeFrame {
    Message {
        sender: String,
        #[serde(default)]
        sender_name: Option<String>,
        text: String,
        #[serde(default)]
        timestamp: f64,
        kind: MessageKind,
        #[serde(default)]
        channel: Option<u8>,
    },
    Advert {
        node_id: String,
        #[serde(default)]
        node_name: Option<String>,
    },
    NewContact {
        node_id: String,
        #[serde(default)]
        node_name: Option<String>,
    },
    PathUpdate {
        node_id: String,
        #[serde(default)]
        hops: u32,
    },
    StatusResponse {
        node_id: String,
    },
    SelfInfo {
        #[serde(default)]
        public_key: Option<String>,
        #[serde(default)]
        node_name: Option<String>,
    },
    Contacts {
        contacts: Vec<Contact>,
    },
}

/// State the reader task keeps current from bridge frames
#[derive(Debug, Default)]
struct BridgeState {
    self_info: Option<SelfInfo>,
    contacts: Vec<Contact>,
}

/// TCP adapter to the companion radio bridge
#[derive(Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connected: Arc<AtomicBool>,
    writer: Arc<Mutex<Option<OwnedWriteHalf>>>,
    state: Arc<RwLock<BridgeState>>,
    event_tx: Option<mpsc::Sender<TransportEvent>>,
}

impl TcpTransport {
    /// Create an adapter for a bridge at `host:port`
    #[must_use]
    pub fn new(host: String, port: u16) -> Self {
        Self {
            host,
            port,
            connected: Arc::new(AtomicBool::new(false)),
            writer: Arc::new(Mutex::new(None)),
            state: Arc::new(RwLock::new(BridgeState::default())),
            event_tx: None,
        }
    }

    /// Create with an event receiver for the daemon loop
    #[must_use]
    pub fn with_receiver(host: String, port: u16) -> (Self, mpsc::Receiver<TransportEvent>) {
        let (tx, rx) = mpsc::channel(100);
        let mut transport = Self::new(host, port);
        transport.event_tx = Some(tx);
        (transport, rx)
    }

    /// Write one command frame to the bridge
    async fn write_frame(&self, frame: &serde_json::Value) -> Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(Error::NotConnected)?;

        let mut line = frame.to_string();
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Transport(format!("bridge write failed: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("bridge flush failed: {e}")))?;
        Ok(())
    }

    /// Decode and dispatch one inbound frame
    async fn handle_frame(
        line: &str,
        state: &RwLock<BridgeState>,
        event_tx: Option<&mpsc::Sender<TransportEvent>>,
    ) {
        let frame: BridgeFrame = match serde_json::from_str(line) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, line, "unparseable bridge frame");
                return;
            }
        };

        let event = match frame {
            BridgeFrame::Message {
                sender,
                sender_name,
                text,
                timestamp,
                kind,
                channel,
            } => Some(TransportEvent::Message(MeshMessage {
                sender,
                sender_name,
                content: text,
                timestamp,
                kind,
                channel,
            })),
            BridgeFrame::Advert { node_id, node_name } => {
                Some(TransportEvent::Advert { node_id, node_name })
            }
            BridgeFrame::NewContact { node_id, node_name } => {
                Some(TransportEvent::NewContact { node_id, node_name })
            }
            BridgeFrame::PathUpdate { node_id, hops } => {
                Some(TransportEvent::PathUpdate { node_id, hops })
            }
            BridgeFrame::StatusResponse { node_id } => {
                Some(TransportEvent::StatusResponse { node_id })
            }
            BridgeFrame::SelfInfo {
                public_key,
                node_name,
            } => {
                state.write().await.self_info = Some(SelfInfo {
                    public_key,
                    node_name,
                });
                None
            }
            BridgeFrame::Contacts { contacts } => {
                state.write().await.contacts = contacts;
                None
            }
        };

        if let Some(event) = event
            && let Some(tx) = event_tx
            && tx.send(event).await.is_err()
        {
            tracing::warn!("transport event receiver dropped");
        }
    }
}

#[async_trait]
impl MeshTransport for TcpTransport {
    fn name(&self) -> &'static str {
        "tcp"
    }

    async fn connect(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| Error::Transport(format!("bridge connect to {addr} failed: {e}")))?;
        tracing::info!(addr, "connected to companion bridge");

        let (read_half, write_half) = stream.into_split();
        *self.writer.lock().await = Some(write_half);
        self.connected.store(true, Ordering::SeqCst);

        // Reader task: decode frames until the bridge goes away
        let state = Arc::clone(&self.state);
        let event_tx = self.event_tx.clone();
        let connected = Arc::clone(&self.connected);
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        Self::handle_frame(&line, &state, event_tx.as_ref()).await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "bridge read failed");
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            tracing::warn!("companion bridge disconnected");
            if let Some(tx) = event_tx {
                let _ = tx.send(TransportEvent::Disconnected).await;
            }
        });

        // Ask the bridge for identity and the contact list up front
        self.write_frame(&json!({"op": "get_self"})).await?;
        self.write_frame(&json!({"op": "get_contacts"})).await?;

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        tracing::info!("disconnected from companion bridge");
        Ok(())
    }

    async fn send(&self, destination: &Destination, text: &str) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::NotConnected);
        }
        let frame = match destination {
            Destination::Node(key) => json!({"op": "send_direct", "to": key, "text": text}),
            Destination::Channel(id) => json!({"op": "send_channel", "channel": id, "text": text}),
        };
        self.write_frame(&frame).await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn contacts(&self) -> Result<Vec<Contact>> {
        // Refresh request is fire-and-forget; return what we have
        self.write_frame(&json!({"op": "get_contacts"})).await?;
        Ok(self.state.read().await.contacts.clone())
    }

    async fn ping(&self, destination: &Destination) -> Result<bool> {
        let Destination::Node(key) = destination else {
            return Ok(false);
        };
        self.write_frame(&json!({"op": "status_request", "to": key}))
            .await?;
        Ok(true)
    }

    async fn set_node_name(&self, name: &str) -> Result<()> {
        self.write_frame(&json!({"op": "set_name", "name": name}))
            .await
    }

    async fn sync_clock(&self) -> Result<()> {
        let unix = chrono::Utc::now().timestamp();
        self.write_frame(&json!({"op": "set_time", "unix": unix}))
            .await
    }

    async fn send_advert(&self, flood: bool) -> Result<()> {
        self.write_frame(&json!({"op": "advert", "flood": flood}))
            .await
    }

    async fn self_info(&self) -> Result<SelfInfo> {
        // The bridge answers get_self asynchronously; wait briefly for the
        // reader task to record it
        let deadline = tokio::time::Instant::now() + SELF_INFO_WAIT;
        loop {
            if let Some(info) = self.state.read().await.self_info.clone() {
                return Ok(info);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(SelfInfo::default());
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_connection_fails() {
        let transport = TcpTransport::new("127.0.0.1".to_string(), 1);
        let err = transport
            .send(&Destination::Channel(0), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn message_frame_decodes_to_event() {
        let state = RwLock::new(BridgeState::default());
        let (tx, mut rx) = mpsc::channel(4);

        let line = r#"{"event":"message","sender":"ab12","text":"hello","kind":"direct"}"#;
        TcpTransport::handle_frame(line, &state, Some(&tx)).await;

        let event = rx.recv().await.unwrap();
        match event {
            TransportEvent::Message(msg) => {
                assert_eq!(msg.sender, "ab12");
                assert_eq!(msg.content, "hello");
                assert_eq!(msg.kind, MessageKind::Direct);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn self_info_frame_updates_state() {
        let state = RwLock::new(BridgeState::default());

        let line = r#"{"event":"self_info","public_key":"cafe1234","node_name":"MeshBot"}"#;
        TcpTransport::handle_frame(line, &state, None).await;

        let info = state.read().await.self_info.clone().unwrap();
        assert_eq!(info.public_key.as_deref(), Some("cafe1234"));
        assert_eq!(info.node_name.as_deref(), Some("MeshBot"));
    }

    #[tokio::test]
    async fn malformed_frame_is_ignored() {
        let state = RwLock::new(BridgeState::default());
        let (tx, mut rx) = mpsc::channel(4);

        TcpTransport::handle_frame("not json at all", &state, Some(&tx)).await;
        drop(tx);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn channel_message_frame_carries_channel_id() {
        let state = RwLock::new(BridgeState::default());
        let (tx, mut rx) = mpsc::channel(4);

        let line =
            r#"{"event":"message","sender":"ab12","text":"hey","kind":"channel","channel":3}"#;
        TcpTransport::handle_frame(line, &state, Some(&tx)).await;

        match rx.recv().await.unwrap() {
            TransportEvent::Message(msg) => {
                assert_eq!(msg.kind, MessageKind::Channel);
                assert_eq!(msg.channel, Some(3));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
