//! Mesh transport adapters
//!
//! The radio itself lives in a companion device; this module only models
//! the opaque send/receive capability the gateway consumes. Each adapter
//! implements the [`MeshTransport`] trait and surfaces inbound traffic as
//! [`TransportEvent`]s on an mpsc channel.

pub mod mock;
pub mod tcp;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use mock::MockTransport;
pub use tcp::TcpTransport;

use crate::Result;

/// Highest numeric channel id the mesh supports
pub const MAX_CHANNEL: u16 = 255;

/// Where an outbound message is headed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Direct message to a node, addressed by public key (or prefix)
    Node(String),
    /// Broadcast to a numbered channel
    Channel(u8),
}

impl Destination {
    /// Parse a destination from its textual form
    ///
    /// Numeric strings up to [`MAX_CHANNEL`] are channel ids; anything
    /// else is treated as a node public key.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.len() <= 3
            && !s.is_empty()
            && s.chars().all(|c| c.is_ascii_digit())
            && s.parse::<u16>().is_ok_and(|n| n <= MAX_CHANNEL)
        {
            // Safe: value verified <= 255 above
            Self::Channel(s.parse::<u16>().unwrap_or_default() as u8)
        } else {
            Self::Node(s.to_string())
        }
    }

    /// Whether this destination is a channel broadcast
    #[must_use]
    pub const fn is_channel(&self) -> bool {
        matches!(self, Self::Channel(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(key) => {
                // Keys are long; log only a prefix
                let prefix: String = key.chars().take(16).collect();
                write!(f, "{prefix}")
            }
            Self::Channel(id) => write!(f, "ch{id}"),
        }
    }
}

/// Kind of an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Direct (private) message to this node
    Direct,
    /// Message on a shared channel
    Channel,
}

/// A text message received from the mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshMessage {
    /// Sender public key (or prefix)
    pub sender: String,

    /// Sender display name, if the radio resolved one
    pub sender_name: Option<String>,

    /// Message text
    pub content: String,

    /// Sender-side unix timestamp (seconds)
    pub timestamp: f64,

    /// Direct or channel message
    pub kind: MessageKind,

    /// Channel id for channel messages
    pub channel: Option<u8>,
}

impl MeshMessage {
    /// Conversation identifier this message belongs to
    ///
    /// Channel messages converse per channel; direct messages per sender.
    #[must_use]
    pub fn conversation_id(&self) -> String {
        match self.kind {
            MessageKind::Channel => self.channel.unwrap_or(0).to_string(),
            MessageKind::Direct => self.sender.clone(),
        }
    }

    /// Destination a reply to this message should be sent to
    #[must_use]
    pub fn reply_destination(&self) -> Destination {
        match self.kind {
            MessageKind::Channel => Destination::Channel(self.channel.unwrap_or(0)),
            MessageKind::Direct => Destination::Node(self.sender.clone()),
        }
    }
}

/// A contact known to the companion radio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    /// Node public key
    pub public_key: String,
    /// Advertised display name
    pub name: Option<String>,
    /// Unix timestamp of last contact, if known
    pub last_seen: Option<f64>,
    /// Whether the radio currently considers the node reachable
    pub is_online: bool,
}

/// Identity of the local node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelfInfo {
    /// Our public key (or prefix)
    pub public_key: Option<String>,
    /// Our advertised node name
    pub node_name: Option<String>,
}

/// Something the mesh told us
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// An inbound text message
    Message(MeshMessage),
    /// A node advertised its presence
    Advert {
        /// Advertising node public key
        node_id: String,
        /// Advertised name, if any
        node_name: Option<String>,
    },
    /// The radio learned a new contact
    NewContact {
        /// Contact public key
        node_id: String,
        /// Contact name, if any
        node_name: Option<String>,
    },
    /// Routing path to a node changed
    PathUpdate {
        /// Affected node public key
        node_id: String,
        /// Hop count on the new path
        hops: u32,
    },
    /// A node answered a status request
    StatusResponse {
        /// Responding node public key
        node_id: String,
    },
    /// The link to the companion radio dropped
    Disconnected,
}

/// Trait for mesh transport adapters
///
/// `send` failures are transient and retryable; ordering across sends is
/// entirely the caller's responsibility.
#[async_trait]
pub trait MeshTransport: Send + Sync {
    /// Get the transport name
    fn name(&self) -> &'static str;

    /// Connect to the companion radio
    async fn connect(&mut self) -> Result<()>;

    /// Disconnect from the companion radio
    async fn disconnect(&mut self) -> Result<()>;

    /// Send one wire-size-bounded text message
    async fn send(&self, destination: &Destination, text: &str) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// List contacts known to the radio
    async fn contacts(&self) -> Result<Vec<Contact>> {
        Ok(Vec::new())
    }

    /// Probe a node (status request); true if the request went out
    async fn ping(&self, _destination: &Destination) -> Result<bool> {
        Ok(false)
    }

    /// Set the radio's advertised node name
    async fn set_node_name(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    /// Sync the companion radio clock to host time
    async fn sync_clock(&self) -> Result<()> {
        Ok(())
    }

    /// Announce our presence (flood = network-wide)
    async fn send_advert(&self, _flood: bool) -> Result<()> {
        Ok(())
    }

    /// Fetch the local node identity
    async fn self_info(&self) -> Result<SelfInfo> {
        Ok(SelfInfo::default())
    }
}
