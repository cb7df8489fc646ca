//! Tool dispatch with explicit dependencies

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{ToolName, fun, nodes, utility, weather};
use crate::config::WeatherConfig;
use crate::db::{AdvertRepo, MessageRepo, NodeRepo};
use crate::events::EventRing;
use crate::transport::{Destination, MeshTransport};
use crate::Result;

/// Result cap shared by the listing tools
const MAX_LIST_LIMIT: usize = 50;

#[derive(Debug, Default, Deserialize)]
struct WeatherArgs {
    latitude: Option<f64>,
    longitude: Option<f64>,
    forecast_days: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
struct CalculateArgs {
    expression: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TimeArgs {
    format: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DiceArgs {
    count: Option<u32>,
    sides: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RandomArgs {
    min_value: Option<i64>,
    max_value: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct ListNodesArgs {
    online_only: Option<bool>,
    has_name: Option<bool>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct NodeInfoArgs {
    node_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListAdvertsArgs {
    node_id: Option<String>,
    hours_ago: Option<i64>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelMessagesArgs {
    channel: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct UserMessagesArgs {
    user_id: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct EventsArgs {
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct PingArgs {
    destination: Option<String>,
}

/// Executes tool calls against gateway state
///
/// Every dependency is passed in explicitly; the executor owns no hidden
/// globals.
pub struct ToolExecutor {
    http: reqwest::Client,
    model: String,
    transport: Arc<dyn MeshTransport>,
    messages: MessageRepo,
    nodes: NodeRepo,
    adverts: AdvertRepo,
    events: Arc<Mutex<EventRing>>,
    weather: WeatherConfig,
}

impl ToolExecutor {
    /// Create an executor over the gateway's shared state
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: String,
        transport: Arc<dyn MeshTransport>,
        messages: MessageRepo,
        nodes: NodeRepo,
        adverts: AdvertRepo,
        events: Arc<Mutex<EventRing>>,
        weather: WeatherConfig,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            model,
            transport,
            messages,
            nodes,
            adverts,
            events,
            weather,
        }
    }

    /// Execute one tool call
    ///
    /// `arguments` is the raw JSON argument string from the model;
    /// malformed arguments fall back to defaults rather than failing the
    /// whole turn.
    ///
    /// # Errors
    ///
    /// Returns error for unknown tool names or failed side effects
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String> {
        let tool: ToolName = name.parse()?;
        tracing::info!(tool = name, arguments, "tool call");

        match tool {
            ToolName::GetWeather => self.get_weather(parse_args(arguments)).await,
            ToolName::Calculate => {
                let args: CalculateArgs = parse_args(arguments);
                match args.expression {
                    Some(expression) => Ok(utility::calculate(&expression)
                        .unwrap_or_else(|e| format!("Error calculating: {e}"))),
                    None => Ok("No expression given".to_string()),
                }
            }
            ToolName::GetCurrentTime => {
                let args: TimeArgs = parse_args(arguments);
                Ok(utility::current_time(args.format.as_deref().unwrap_or("human")))
            }
            ToolName::GetBotStatus => self.bot_status().await,
            ToolName::RollDice => {
                let args: DiceArgs = parse_args(arguments);
                Ok(fun::roll_dice(
                    args.count.unwrap_or(1),
                    args.sides.unwrap_or(6),
                ))
            }
            ToolName::FlipCoin => Ok(fun::flip_coin()),
            ToolName::RandomNumber => {
                let args: RandomArgs = parse_args(arguments);
                Ok(fun::random_number(
                    args.min_value.unwrap_or(1),
                    args.max_value.unwrap_or(100),
                ))
            }
            ToolName::Magic8Ball => Ok(fun::magic_8ball()),
            ToolName::ListNodes => {
                let args: ListNodesArgs = parse_args(arguments);
                let list = self.nodes.list(
                    args.online_only.unwrap_or(false),
                    args.has_name.unwrap_or(false),
                    args.limit.unwrap_or(20).min(MAX_LIST_LIMIT),
                )?;
                Ok(nodes::format_node_list(&list))
            }
            ToolName::GetNodeInfo => {
                let args: NodeInfoArgs = parse_args(arguments);
                let Some(node_id) = args.node_id else {
                    return Ok("No node id given".to_string());
                };
                match self.nodes.find_by_prefix(&node_id)? {
                    Some(node) => Ok(nodes::format_node_info(&node)),
                    None => Ok(format!("Node not found: {node_id}")),
                }
            }
            ToolName::ListAdverts => {
                let args: ListAdvertsArgs = parse_args(arguments);
                let since = args.hours_ago.map(|h| Utc::now() - Duration::hours(h));
                let adverts = self.adverts.search(
                    args.node_id.as_deref(),
                    since,
                    args.limit.unwrap_or(20).min(MAX_LIST_LIMIT),
                )?;
                Ok(nodes::format_adverts(&adverts))
            }
            ToolName::GetChannelMessages => {
                let args: ChannelMessagesArgs = parse_args(arguments);
                let channel = args.channel.unwrap_or_else(|| "0".to_string());
                let messages = self.messages.recent(&channel, args.limit.unwrap_or(5))?;
                Ok(nodes::format_conversation(
                    &messages,
                    &format!("in channel {channel}"),
                ))
            }
            ToolName::GetUserMessages => {
                let args: UserMessagesArgs = parse_args(arguments);
                let Some(user_id) = args.user_id else {
                    return Ok("No user id given".to_string());
                };
                let messages = self.messages.recent(&user_id, args.limit.unwrap_or(5))?;
                let label: String = user_id.chars().take(16).collect();
                Ok(nodes::format_conversation(
                    &messages,
                    &format!("with {label}"),
                ))
            }
            ToolName::GetNetworkEvents => {
                let args: EventsArgs = parse_args(arguments);
                let events = self.events.lock().await.recent(args.limit.unwrap_or(10));
                if events.is_empty() {
                    Ok("No recent network events".to_string())
                } else {
                    Ok(events.join("\n"))
                }
            }
            ToolName::PingNode => {
                let args: PingArgs = parse_args(arguments);
                let Some(destination) = args.destination else {
                    return Ok("No destination given".to_string());
                };
                let dest = Destination::Node(destination.clone());
                if self.transport.ping(&dest).await? {
                    Ok(format!("Status request sent to {destination}"))
                } else {
                    Ok(format!("Could not reach {destination}"))
                }
            }
        }
    }

    async fn get_weather(&self, args: WeatherArgs) -> Result<String> {
        let coords = match (args.latitude, args.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => self
                .weather
                .latitude
                .zip(self.weather.longitude),
        };
        let Some((latitude, longitude)) = coords else {
            return Ok(
                "Weather coordinates not configured. Set weather.latitude and weather.longitude."
                    .to_string(),
            );
        };

        let days = args.forecast_days.unwrap_or(self.weather.forecast_days.max(1));
        match weather::fetch_forecast(&self.http, latitude, longitude, days).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                tracing::warn!(error = %e, "weather fetch failed");
                Ok("Weather service unavailable. Please try again later.".to_string())
            }
        }
    }

    async fn bot_status(&self) -> Result<String> {
        let connected = self.transport.is_connected();
        let contacts = self.transport.contacts().await.unwrap_or_default();
        let online = contacts.iter().filter(|c| c.is_online).count();
        let total_messages = self.messages.total()?;
        let tracked_nodes = self.nodes.count()?;

        Ok(format!(
            "Bot Status:\n\
             Connected: {}\n\
             Contacts: {online}/{} online\n\
             Nodes tracked: {tracked_nodes}\n\
             Total messages: {total_messages}\n\
             Model: {}",
            if connected { "Yes" } else { "No" },
            contacts.len(),
            self.model,
        ))
    }
}

/// Parse tool arguments leniently; malformed JSON becomes defaults
fn parse_args<T: Default + for<'de> Deserialize<'de>>(arguments: &str) -> T {
    serde_json::from_str(arguments).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::db::MessageRole;
    use crate::transport::{MeshTransport, MockTransport};
    use crate::transport::MessageKind;

    async fn executor() -> (ToolExecutor, MockTransport) {
        let pool = db::init_memory().unwrap();
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();

        let executor = ToolExecutor::new(
            "test-model".to_string(),
            Arc::new(transport.clone()),
            MessageRepo::new(pool.clone()),
            NodeRepo::new(pool.clone()),
            AdvertRepo::new(pool),
            Arc::new(Mutex::new(EventRing::default())),
            WeatherConfig::default(),
        );
        (executor, transport)
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let (executor, _) = executor().await;
        assert!(executor.execute("no_such_tool", "{}").await.is_err());
    }

    #[tokio::test]
    async fn calculate_dispatches() {
        let (executor, _) = executor().await;
        let result = executor
            .execute("calculate", r#"{"expression": "6 * 7"}"#)
            .await
            .unwrap();
        assert_eq!(result, "6 * 7 = 42");
    }

    #[tokio::test]
    async fn calculate_without_expression_degrades() {
        let (executor, _) = executor().await;
        let result = executor.execute("calculate", "{}").await.unwrap();
        assert_eq!(result, "No expression given");
    }

    #[tokio::test]
    async fn malformed_arguments_fall_back_to_defaults() {
        let (executor, _) = executor().await;
        let result = executor.execute("roll_dice", "not json").await.unwrap();
        assert!(result.starts_with("Rolled 1d6: "));
    }

    #[tokio::test]
    async fn status_reports_connection_and_counts() {
        let (executor, _) = executor().await;
        let result = executor.execute("get_bot_status", "{}").await.unwrap();
        assert!(result.contains("Connected: Yes"));
        assert!(result.contains("Model: test-model"));
        assert!(result.contains("Total messages: 0"));
    }

    #[tokio::test]
    async fn list_nodes_reads_registry() {
        let (executor, _) = executor().await;
        executor.nodes.upsert("abcd1234", Some("Ridge"), true).unwrap();

        let result = executor.execute("list_nodes", "{}").await.unwrap();
        assert!(result.contains("abcd1234"));
        assert!(result.contains("Ridge"));
    }

    #[tokio::test]
    async fn node_info_handles_missing_node() {
        let (executor, _) = executor().await;
        let result = executor
            .execute("get_node_info", r#"{"node_id": "ffff"}"#)
            .await
            .unwrap();
        assert_eq!(result, "Node not found: ffff");
    }

    #[tokio::test]
    async fn channel_messages_read_history() {
        let (executor, _) = executor().await;
        executor
            .messages
            .add("0", MessageKind::Channel, MessageRole::User, Some("ab"), "hello mesh")
            .unwrap();

        let result = executor
            .execute("get_channel_messages", r#"{"channel": "0"}"#)
            .await
            .unwrap();
        assert!(result.contains("User: hello mesh"));
    }

    #[tokio::test]
    async fn network_events_come_from_the_ring() {
        let (executor, _) = executor().await;
        executor
            .events
            .lock()
            .await
            .push("ADVERT from abcd1234".to_string());

        let result = executor.execute("get_network_events", "{}").await.unwrap();
        assert!(result.contains("ADVERT from abcd1234"));
    }

    #[tokio::test]
    async fn ping_node_uses_transport() {
        let (executor, _) = executor().await;
        let ok = executor
            .execute("ping_node", r#"{"destination": "node1"}"#)
            .await
            .unwrap();
        assert!(ok.contains("Status request sent"));

        let missing = executor
            .execute("ping_node", r#"{"destination": "stranger"}"#)
            .await
            .unwrap();
        assert!(missing.contains("Could not reach"));
    }

    #[tokio::test]
    async fn weather_without_coordinates_degrades() {
        let (executor, _) = executor().await;
        let result = executor.execute("get_weather", "{}").await.unwrap();
        assert!(result.contains("not configured"));
    }
}
