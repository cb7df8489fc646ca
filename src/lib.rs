//! MeshBot Gateway - conversational AI relay for LoRa mesh networks
//!
//! This library provides the core functionality for the relay:
//! - Mesh transport adapters (companion bridge, mock)
//! - Incoming message gating and built-in command routing
//! - LLM agent with a closed tool set
//! - Length-bounded, duty-cycle-aware reply delivery
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  LoRa mesh radio                     │
//! │        (companion device, opaque transport)          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                MeshBot Gateway                       │
//! │   Daemon │ Gate │ Router │ Agent+Tools │ Delivery   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │           LLM API (chat completions)                 │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod daemon;
pub mod db;
pub mod delivery;
pub mod error;
pub mod events;
pub mod prompt;
pub mod router;
pub mod setup;
pub mod tools;
pub mod transport;

pub use agent::{AgentRunner, LlmClient};
pub use config::{Config, RelayConfig, TransportKind};
pub use context::ContextBuilder;
pub use daemon::{Daemon, MessageGate};
pub use db::{DbConn, DbPool};
pub use delivery::{DeliveryConfig, DeliveryError, DeliveryReport, Pacer, deliver, split_message};
pub use error::{Error, Result};
pub use events::EventRing;
pub use router::{Command, RouteOutcome};
pub use tools::{ToolExecutor, ToolName};
pub use transport::{
    Contact, Destination, MeshMessage, MeshTransport, MessageKind, MockTransport, SelfInfo,
    TcpTransport, TransportEvent,
};
