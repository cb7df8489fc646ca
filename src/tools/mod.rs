//! Agent tools
//!
//! The tool surface is a closed set of tagged variants dispatched through
//! a single match in [`ToolExecutor`] — no dynamic registration. Adding a
//! tool means adding a variant, its spec, and a match arm.

pub mod executor;
mod fun;
pub(crate) mod nodes;
mod utility;
mod weather;

use std::str::FromStr;

use serde::Serialize;
use serde_json::json;

use crate::{Error, Result};

pub use executor::ToolExecutor;

/// Every tool the agent may call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    GetWeather,
    Calculate,
    GetCurrentTime,
    GetBotStatus,
    RollDice,
    FlipCoin,
    RandomNumber,
    Magic8Ball,
    ListNodes,
    GetNodeInfo,
    ListAdverts,
    GetChannelMessages,
    GetUserMessages,
    GetNetworkEvents,
    PingNode,
}

impl ToolName {
    /// Wire name of the tool
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetWeather => "get_weather",
            Self::Calculate => "calculate",
            Self::GetCurrentTime => "get_current_time",
            Self::GetBotStatus => "get_bot_status",
            Self::RollDice => "roll_dice",
            Self::FlipCoin => "flip_coin",
            Self::RandomNumber => "random_number",
            Self::Magic8Ball => "magic_8ball",
            Self::ListNodes => "list_nodes",
            Self::GetNodeInfo => "get_node_info",
            Self::ListAdverts => "list_adverts",
            Self::GetChannelMessages => "get_channel_messages",
            Self::GetUserMessages => "get_user_messages",
            Self::GetNetworkEvents => "get_network_events",
            Self::PingNode => "ping_node",
        }
    }

    /// All tools, in declaration order
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::GetWeather,
            Self::Calculate,
            Self::GetCurrentTime,
            Self::GetBotStatus,
            Self::RollDice,
            Self::FlipCoin,
            Self::RandomNumber,
            Self::Magic8Ball,
            Self::ListNodes,
            Self::GetNodeInfo,
            Self::ListAdverts,
            Self::GetChannelMessages,
            Self::GetUserMessages,
            Self::GetNetworkEvents,
            Self::PingNode,
        ]
    }
}

impl FromStr for ToolName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::all()
            .iter()
            .find(|tool| tool.as_str() == s)
            .copied()
            .ok_or_else(|| Error::Tool(format!("unknown tool '{s}'")))
    }
}

/// JSON-schema declaration of one tool, in chat-completions format
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub function: ToolFunctionSpec,
}

/// Function block of a tool spec
#[derive(Debug, Clone, Serialize)]
pub struct ToolFunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

fn spec(
    name: ToolName,
    description: &'static str,
    parameters: serde_json::Value,
) -> ToolSpec {
    ToolSpec {
        kind: "function",
        function: ToolFunctionSpec {
            name: name.as_str(),
            description,
            parameters,
        },
    }
}

/// Declarations for every tool, handed to the model with each request
#[must_use]
pub fn specs() -> Vec<ToolSpec> {
    vec![
        spec(
            ToolName::GetWeather,
            "Get the weather forecast for the configured location. \
             Makes the HTTP request itself; call it once only.",
            json!({
                "type": "object",
                "properties": {
                    "latitude": {"type": "number", "description": "Override latitude"},
                    "longitude": {"type": "number", "description": "Override longitude"},
                    "forecast_days": {"type": "integer", "description": "Days of forecast (default 1)"}
                }
            }),
        ),
        spec(
            ToolName::Calculate,
            "Evaluate an arithmetic expression, e.g. \"2 + 2 * 3\" or \"(8 - 3) / 2\".",
            json!({
                "type": "object",
                "properties": {
                    "expression": {"type": "string", "description": "Expression to evaluate"}
                },
                "required": ["expression"]
            }),
        ),
        spec(
            ToolName::GetCurrentTime,
            "Get the current date and time.",
            json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "enum": ["human", "unix", "iso"],
                        "description": "Output format (default human)"
                    }
                }
            }),
        ),
        spec(
            ToolName::GetBotStatus,
            "Get bot status: connection state, contacts, message counts.",
            json!({"type": "object", "properties": {}}),
        ),
        spec(
            ToolName::RollDice,
            "Roll dice.",
            json!({
                "type": "object",
                "properties": {
                    "count": {"type": "integer", "description": "Number of dice, 1-10 (default 1)"},
                    "sides": {"type": "integer", "description": "Sides per die, 2-100 (default 6)"}
                }
            }),
        ),
        spec(
            ToolName::FlipCoin,
            "Flip a coin.",
            json!({"type": "object", "properties": {}}),
        ),
        spec(
            ToolName::RandomNumber,
            "Generate a random number in a range.",
            json!({
                "type": "object",
                "properties": {
                    "min_value": {"type": "integer", "description": "Minimum, inclusive (default 1)"},
                    "max_value": {"type": "integer", "description": "Maximum, inclusive (default 100)"}
                }
            }),
        ),
        spec(
            ToolName::Magic8Ball,
            "Ask the magic 8-ball a yes/no question.",
            json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "The yes/no question"}
                },
                "required": ["question"]
            }),
        ),
        spec(
            ToolName::ListNodes,
            "List known mesh nodes with optional filters.",
            json!({
                "type": "object",
                "properties": {
                    "online_only": {"type": "boolean", "description": "Only nodes currently online"},
                    "has_name": {"type": "boolean", "description": "Only nodes with friendly names"},
                    "limit": {"type": "integer", "description": "Max results (default 20, max 50)"}
                }
            }),
        ),
        spec(
            ToolName::GetNodeInfo,
            "Get details about one mesh node by public key or prefix.",
            json!({
                "type": "object",
                "properties": {
                    "node_id": {"type": "string", "description": "Node public key, full or prefix"}
                },
                "required": ["node_id"]
            }),
        ),
        spec(
            ToolName::ListAdverts,
            "Search the advertisement history of mesh nodes.",
            json!({
                "type": "object",
                "properties": {
                    "node_id": {"type": "string", "description": "Filter by node key prefix"},
                    "hours_ago": {"type": "integer", "description": "Only adverts from the last N hours"},
                    "limit": {"type": "integer", "description": "Max results (default 20, max 50)"}
                }
            }),
        ),
        spec(
            ToolName::GetChannelMessages,
            "Get recent messages from a channel conversation.",
            json!({
                "type": "object",
                "properties": {
                    "channel": {"type": "string", "description": "Channel number (default \"0\")"},
                    "limit": {"type": "integer", "description": "Messages to return (default 5)"}
                }
            }),
        ),
        spec(
            ToolName::GetUserMessages,
            "Get recent private messages exchanged with a user.",
            json!({
                "type": "object",
                "properties": {
                    "user_id": {"type": "string", "description": "User public key, full or prefix"},
                    "limit": {"type": "integer", "description": "Messages to return (default 5)"}
                },
                "required": ["user_id"]
            }),
        ),
        spec(
            ToolName::GetNetworkEvents,
            "Get recent mesh network events (adverts, new contacts, path changes).",
            json!({
                "type": "object",
                "properties": {
                    "limit": {"type": "integer", "description": "Events to return (default 10)"}
                }
            }),
        ),
        spec(
            ToolName::PingNode,
            "Send a status probe to a mesh node.",
            json!({
                "type": "object",
                "properties": {
                    "destination": {"type": "string", "description": "Node public key, full or prefix"}
                },
                "required": ["destination"]
            }),
        ),
    ]
}
