//! Daemon - the relay service
//!
//! Orchestrates the mesh transport, message gating, command routing,
//! the agent, and chunked reply delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::agent::{AgentRunner, LlmClient};
use crate::config::{Config, TransportKind};
use crate::context::ContextBuilder;
use crate::db::{self, AdvertRepo, DbPool, MessageRepo, MessageRole, NodeRepo};
use crate::delivery::{self, DeliveryConfig};
use crate::events::EventRing;
use crate::router::{Command, RouteOutcome};
use crate::tools::{ToolExecutor, nodes::format_conversation};
use crate::transport::{
    Destination, MeshMessage, MeshTransport, MessageKind, MockTransport, TcpTransport,
    TransportEvent,
};
use crate::{Error, Result, prompt, router};

/// Companion clock sync is best-effort; give up after this long
const CLOCK_SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// Sent when the agent or delivery fails hard
const APOLOGY: &str = "Sorry, I encountered an error processing your message.";

/// The relay daemon
pub struct Daemon {
    config: Config,
    db: DbPool,
}

/// Decides which inbound messages deserve a reply
#[derive(Debug, Clone)]
pub struct MessageGate {
    /// Our own public key, for self-message filtering
    pub own_key: Option<String>,
    /// Lowercased `@name` the bot answers to on channels
    pub mention: Option<String>,
    /// Channel the bot listens on
    pub listen_channel: u8,
}

impl MessageGate {
    /// Whether `sender` is (a prefix of) our own key
    fn is_self(&self, sender: &str) -> bool {
        let Some(own) = &self.own_key else {
            return false;
        };
        if sender.is_empty() {
            return false;
        }
        let own_prefix: String = own.chars().take(16).collect();
        sender == own || sender.starts_with(&own_prefix) || own.starts_with(sender)
    }

    /// Apply the gating rules: never self, always DMs, channels only on
    /// the listen channel with an `@name` or `@[name]` mention
    #[must_use]
    pub fn should_respond(&self, msg: &MeshMessage) -> bool {
        if self.is_self(&msg.sender) {
            tracing::debug!(sender = %msg.sender, "ignoring message from self");
            return false;
        }

        match msg.kind {
            MessageKind::Direct => true,
            MessageKind::Channel => {
                if msg.channel.unwrap_or(0) != self.listen_channel {
                    return false;
                }
                let Some(mention) = &self.mention else {
                    // No node name means no way to be addressed
                    return false;
                };
                let content = msg.content.to_lowercase();
                if content.contains(mention.as_str()) {
                    return true;
                }
                // The radio wraps tagged names in brackets: @[name]
                let bracketed = format!("@[{}]", mention.trim_start_matches('@'));
                content.contains(&bracketed)
            }
        }
    }
}

/// Shared state each message handler task needs
struct RelayContext {
    runner: AgentRunner,
    transport: Arc<dyn MeshTransport>,
    messages: MessageRepo,
    nodes: NodeRepo,
    system_prompt: String,
    delivery: DeliveryConfig,
    context: ContextBuilder,
    /// Chunks of one reply must never interleave with another reply to
    /// the same destination
    destination_locks: Mutex<HashMap<Destination, Arc<Mutex<()>>>>,
    model: String,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the data directory or database cannot be set up
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let db_path = config.data_dir.join("meshbot.db");
        let db = db::init(&db_path)?;
        tracing::info!(path = %db_path.display(), "database initialized");

        Ok(Self { config, db })
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if startup fails; runtime errors degrade and log
    pub async fn run(self) -> Result<()> {
        let cancel = CancellationToken::new();
        let signal_cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                signal_cancel.cancel();
            }
        });

        let (transport, events) = self.build_transport().await?;
        self.run_with_transport(transport, events, cancel).await
    }

    /// Build and connect the configured transport
    async fn build_transport(
        &self,
    ) -> Result<(Arc<dyn MeshTransport>, mpsc::Receiver<TransportEvent>)> {
        match self.config.transport.kind {
            TransportKind::Mock => {
                let (mut transport, events) = MockTransport::with_receiver();
                transport.connect().await?;
                Ok((Arc::new(transport), events))
            }
            TransportKind::Tcp => {
                let host = self.config.transport.host.clone().ok_or_else(|| {
                    Error::Config("tcp transport requires a host".to_string())
                })?;
                let (mut transport, events) =
                    TcpTransport::with_receiver(host, self.config.transport.port);
                transport.connect().await?;
                Ok((Arc::new(transport), events))
            }
        }
    }

    /// Run the daemon loop over an already-connected transport
    ///
    /// Exposed separately so embedders and tests can drive the loop with
    /// their own transport and cancellation token.
    ///
    /// # Errors
    ///
    /// Returns error if startup (prompt load, handshake) fails
    pub async fn run_with_transport(
        self,
        transport: Arc<dyn MeshTransport>,
        mut events: mpsc::Receiver<TransportEvent>,
        cancel: CancellationToken,
    ) -> Result<()> {
        // Startup handshake with the companion radio
        let self_info = match transport.self_info().await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "could not retrieve own node identity");
                crate::transport::SelfInfo::default()
            }
        };
        if let Some(key) = &self_info.public_key {
            let prefix: String = key.chars().take(16).collect();
            tracing::info!(key = %prefix, "filtering out messages from self");
        }

        if let Some(name) = &self.config.transport.node_name
            && let Err(e) = transport.set_node_name(name).await
        {
            tracing::warn!(error = %e, "could not set node name");
        }

        match tokio::time::timeout(CLOCK_SYNC_TIMEOUT, transport.sync_clock()).await {
            Ok(Ok(())) => tracing::debug!("companion clock synced"),
            Ok(Err(e)) => tracing::warn!(error = %e, "clock sync failed"),
            Err(_) => tracing::warn!("clock sync timed out, continuing anyway"),
        }

        if let Err(e) = transport.send_advert(true).await {
            tracing::warn!(error = %e, "flood advert failed");
        }

        let mention = self
            .config
            .transport
            .node_name
            .clone()
            .or_else(|| self_info.node_name.clone())
            .map(|name| format!("@{}", name.to_lowercase()));
        match &mention {
            Some(mention) => {
                tracing::info!(mention, "responding to DMs and channel mentions");
            }
            None => {
                tracing::warn!("node name not set - responding to DMs only");
            }
        }

        let gate = MessageGate {
            own_key: self_info.public_key,
            mention,
            listen_channel: self.config.relay.listen_channel,
        };

        let system_prompt = prompt::load_system_prompt(
            &self.config.data_dir,
            self.config.relay.max_message_length,
        )?;

        let messages = MessageRepo::new(self.db.clone());
        let nodes = NodeRepo::new(self.db.clone());
        let adverts = AdvertRepo::new(self.db.clone());
        let event_ring = Arc::new(Mutex::new(EventRing::default()));

        let client = LlmClient::new(&self.config.llm);
        let executor = ToolExecutor::new(
            self.config.llm.model.clone(),
            Arc::clone(&transport),
            messages.clone(),
            nodes.clone(),
            adverts.clone(),
            Arc::clone(&event_ring),
            self.config.weather.clone(),
        );
        let runner = AgentRunner::new(client, executor);

        let ctx = Arc::new(RelayContext {
            runner,
            transport: Arc::clone(&transport),
            messages,
            nodes: nodes.clone(),
            system_prompt,
            delivery: self.config.relay.delivery_config(),
            context: ContextBuilder::default(),
            destination_locks: Mutex::new(HashMap::new()),
            model: self.config.llm.model.clone(),
        });

        tracing::info!(
            transport = transport.name(),
            model = %self.config.llm.model,
            listen_channel = self.config.relay.listen_channel,
            "mesh relay running"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::warn!("transport event stream closed");
                        break;
                    };
                    match event {
                        TransportEvent::Message(msg) => {
                            if !gate.should_respond(&msg) {
                                tracing::debug!(sender = %msg.sender, "message filtered out");
                                continue;
                            }
                            tracing::info!(
                                sender = %msg.sender,
                                kind = ?msg.kind,
                                channel = ?msg.channel,
                                content = %msg.content,
                                "message received"
                            );
                            let ctx = Arc::clone(&ctx);
                            let cancel = cancel.clone();
                            tokio::spawn(async move {
                                handle_message(ctx, msg, cancel).await;
                            });
                        }
                        TransportEvent::Disconnected => {
                            tracing::error!("transport disconnected");
                            break;
                        }
                        other => {
                            record_network_event(&other, &nodes, &adverts, &event_ring).await;
                        }
                    }
                }
            }
        }

        tracing::info!("daemon stopped");
        Ok(())
    }
}

/// Persist one network event and surface it in the ring buffer
async fn record_network_event(
    event: &TransportEvent,
    nodes: &NodeRepo,
    adverts: &AdvertRepo,
    ring: &Arc<Mutex<EventRing>>,
) {
    let short = |key: &str| -> String { key.chars().take(16).collect() };

    let (event_type, node_id, node_name, detail) = match event {
        TransportEvent::Advert { node_id, node_name } => {
            if let Err(e) = nodes.upsert(node_id, node_name.as_deref(), true) {
                tracing::warn!(error = %e, "node upsert failed");
            }
            if let Err(e) = nodes.touch_advert(node_id) {
                tracing::warn!(error = %e, "advert counter update failed");
            }
            if let Err(e) = adverts.add(node_id, node_name.as_deref()) {
                tracing::warn!(error = %e, "advert insert failed");
            }

            let name = resolve_name(nodes, node_id, node_name.as_deref());
            let detail = match &name {
                Some(name) => format!("ADVERT from {} ({name})", short(node_id)),
                None => format!("ADVERT from {}", short(node_id)),
            };
            ("advert", Some(node_id.clone()), name, detail)
        }
        TransportEvent::NewContact { node_id, node_name } => {
            if let Err(e) = nodes.upsert(node_id, node_name.as_deref(), true) {
                tracing::warn!(error = %e, "node upsert failed");
            }

            let name = resolve_name(nodes, node_id, node_name.as_deref());
            let detail = match &name {
                Some(name) => format!("NEW_CONTACT {} ({name})", short(node_id)),
                None => format!("NEW_CONTACT {}", short(node_id)),
            };
            ("new_contact", Some(node_id.clone()), name, detail)
        }
        TransportEvent::PathUpdate { node_id, hops } => {
            let detail = format!("PATH_UPDATE to {} ({hops} hops)", short(node_id));
            ("path_update", Some(node_id.clone()), None, detail)
        }
        TransportEvent::StatusResponse { node_id } => {
            let name = resolve_name(nodes, node_id, None);
            let detail = match &name {
                Some(name) => format!("STATUS from {} ({name})", short(node_id)),
                None => format!("STATUS from {}", short(node_id)),
            };
            ("status_response", Some(node_id.clone()), name, detail)
        }
        TransportEvent::Message(_) | TransportEvent::Disconnected => return,
    };

    if let Err(e) = adverts.add_event(
        event_type,
        node_id.as_deref(),
        node_name.as_deref(),
        Some(&detail),
    ) {
        tracing::warn!(error = %e, "network event insert failed");
    }

    tracing::debug!(event = %detail, "network event");
    ring.lock().await.push(detail);
}

/// Event name if carried, else whatever the registry remembers
fn resolve_name(nodes: &NodeRepo, node_id: &str, carried: Option<&str>) -> Option<String> {
    carried
        .map(String::from)
        .or_else(|| nodes.name_of(node_id).ok().flatten())
}

/// Handle one gated inbound message end to end
async fn handle_message(ctx: Arc<RelayContext>, msg: MeshMessage, cancel: CancellationToken) {
    let conversation_id = msg.conversation_id();
    let destination = msg.reply_destination();

    // Remember the sender in the node registry
    if let Err(e) = ctx
        .nodes
        .upsert(&msg.sender, msg.sender_name.as_deref(), true)
    {
        tracing::warn!(error = %e, "sender upsert failed");
    }

    let reply = match router::route(&msg.content) {
        RouteOutcome::Reply(text) => {
            store_user_message(&ctx, &msg, &conversation_id);
            text
        }
        RouteOutcome::Action(command) => {
            store_user_message(&ctx, &msg, &conversation_id);
            run_command(&ctx, &command, &conversation_id).await
        }
        RouteOutcome::Pass => {
            // History is read before the current message is stored so the
            // prompt doesn't repeat it
            let prompt = ctx
                .context
                .build(&ctx.messages, &conversation_id, &msg.content)
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "context build failed");
                    msg.content.clone()
                });
            store_user_message(&ctx, &msg, &conversation_id);

            match ctx.runner.run(&ctx.system_prompt, &prompt).await {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::error!(error = %e, "agent run failed");
                    APOLOGY.to_string()
                }
            }
        }
    };

    // Serialize deliveries per destination; independent conversations
    // proceed concurrently
    let lock = {
        let mut locks = ctx.destination_locks.lock().await;
        Arc::clone(locks.entry(destination.clone()).or_default())
    };
    let _guard = lock.lock().await;

    match delivery::deliver(
        ctx.transport.as_ref(),
        &destination,
        &reply,
        &ctx.delivery,
        &cancel,
    )
    .await
    {
        Ok(report) => {
            tracing::info!(
                %destination,
                chunks = report.chunks_sent,
                attempts = report.attempts,
                "reply delivered"
            );
            if let Err(e) = ctx.messages.add(
                &conversation_id,
                msg.kind,
                MessageRole::Assistant,
                None,
                &reply,
            ) {
                tracing::warn!(error = %e, "failed to store assistant message");
            }
        }
        Err(e) => {
            tracing::warn!(%destination, error = %e, "reply delivery failed");
        }
    }
}

/// Store the inbound user message
fn store_user_message(ctx: &RelayContext, msg: &MeshMessage, conversation_id: &str) {
    if let Err(e) = ctx.messages.add(
        conversation_id,
        msg.kind,
        MessageRole::User,
        Some(&msg.sender),
        &msg.content,
    ) {
        tracing::warn!(error = %e, "failed to store user message");
    }
}

/// Answer a routed command from daemon state
async fn run_command(ctx: &RelayContext, command: &Command, conversation_id: &str) -> String {
    match command {
        Command::Status => {
            let connected = ctx.transport.is_connected();
            let tracked = ctx.nodes.count().unwrap_or(0);
            let total = ctx.messages.total().unwrap_or(0);
            format!(
                "MeshBot status:\n\
                 Model: {}\n\
                 Transport: {} ({})\n\
                 Nodes tracked: {tracked}\n\
                 Messages: {total}",
                ctx.model,
                ctx.transport.name(),
                if connected { "Connected" } else { "Disconnected" },
            )
        }
        Command::Contacts => match ctx.transport.contacts().await {
            Ok(contacts) if contacts.is_empty() => "No contacts available".to_string(),
            Ok(contacts) => {
                let mut out = String::from("Available contacts:");
                for contact in contacts {
                    let prefix: String = contact.public_key.chars().take(16).collect();
                    match contact.name {
                        Some(name) => out.push_str(&format!("\n- {name} ({prefix})")),
                        None => out.push_str(&format!("\n- {prefix}")),
                    }
                }
                out
            }
            Err(e) => {
                tracing::warn!(error = %e, "contact listing failed");
                "Could not list contacts".to_string()
            }
        },
        Command::History { limit } => match ctx.messages.recent(conversation_id, *limit) {
            Ok(messages) => format_conversation(&messages, "here"),
            Err(e) => {
                tracing::warn!(error = %e, "history read failed");
                "Could not read history".to_string()
            }
        },
        Command::PingNode { destination } => {
            let dest = Destination::Node(destination.clone());
            match ctx.transport.ping(&dest).await {
                Ok(true) => format!("Status request sent to {destination}"),
                Ok(false) => format!("Could not reach {destination}"),
                Err(e) => {
                    tracing::warn!(error = %e, "node ping failed");
                    format!("Could not reach {destination}")
                }
            }
        }
    }
}
