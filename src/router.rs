//! Built-in command routing
//!
//! A handful of commands are answered locally, ahead of the agent:
//! connectivity checks, help, status, and simple queries. Everything
//! else passes through to the LLM. Handlers are evaluated in priority
//! order and the first match wins.

use std::sync::LazyLock;

use regex::Regex;

static CONTACTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^contacts?$").expect("static pattern"));
static HISTORY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^history\s*(\d*)$").expect("static pattern"));
static PING_NODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^ping\s+(\S+)$").expect("static pattern"));

/// Default number of messages the `history` command returns
const DEFAULT_HISTORY_LIMIT: usize = 5;

/// Help text sent for `help` / `commands`
const HELP_TEXT: &str = "MeshBot commands:\n\
    ping - check connectivity\n\
    help - this message\n\
    status - bot status\n\
    contacts - list known contacts\n\
    history [n] - recent conversation\n\
    ping <node> - probe a node\n\
    Anything else is answered by the AI.";

/// A routed command that needs daemon state to answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report bot status
    Status,
    /// List contacts known to the radio
    Contacts,
    /// Show recent conversation history
    History {
        /// Number of messages to show
        limit: usize,
    },
    /// Probe a node by key prefix
    PingNode {
        /// Target node key (or prefix)
        destination: String,
    },
}

/// Result of routing one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Answer directly with this text
    Reply(String),
    /// Execute a command against daemon state
    Action(Command),
    /// Not a built-in; hand the message to the agent
    Pass,
}

/// Route a message to a built-in handler, if one matches
#[must_use]
pub fn route(content: &str) -> RouteOutcome {
    let trimmed = content.trim();
    let lower = trimmed.to_lowercase();

    // Connectivity check, highest priority
    if lower == "ping" || lower == "ping!" {
        return RouteOutcome::Reply("pong".to_string());
    }

    if lower == "help" || lower == "commands" {
        return RouteOutcome::Reply(HELP_TEXT.to_string());
    }

    if lower == "status" || lower == "stats" {
        return RouteOutcome::Action(Command::Status);
    }

    if CONTACTS_RE.is_match(trimmed) {
        return RouteOutcome::Action(Command::Contacts);
    }

    if let Some(caps) = HISTORY_RE.captures(trimmed) {
        let limit = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HISTORY_LIMIT);
        return RouteOutcome::Action(Command::History { limit });
    }

    if let Some(caps) = PING_NODE_RE.captures(trimmed) {
        if let Some(destination) = caps.get(1) {
            return RouteOutcome::Action(Command::PingNode {
                destination: destination.as_str().to_string(),
            });
        }
    }

    RouteOutcome::Pass
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- direct replies ----

    #[test]
    fn ping_answers_pong() {
        assert_eq!(route("ping"), RouteOutcome::Reply("pong".to_string()));
        assert_eq!(route("PING"), RouteOutcome::Reply("pong".to_string()));
        assert_eq!(route("  ping!  "), RouteOutcome::Reply("pong".to_string()));
    }

    #[test]
    fn help_returns_command_list() {
        let RouteOutcome::Reply(text) = route("help") else {
            panic!("expected reply");
        };
        assert!(text.contains("contacts"));
        assert!(text.contains("history"));

        assert!(matches!(route("commands"), RouteOutcome::Reply(_)));
    }

    // ---- actions ----

    #[test]
    fn status_routes_to_action() {
        assert_eq!(route("status"), RouteOutcome::Action(Command::Status));
        assert_eq!(route("stats"), RouteOutcome::Action(Command::Status));
    }

    #[test]
    fn contacts_with_and_without_plural() {
        assert_eq!(route("contacts"), RouteOutcome::Action(Command::Contacts));
        assert_eq!(route("contact"), RouteOutcome::Action(Command::Contacts));
    }

    #[test]
    fn history_parses_optional_limit() {
        assert_eq!(
            route("history"),
            RouteOutcome::Action(Command::History { limit: 5 })
        );
        assert_eq!(
            route("history 12"),
            RouteOutcome::Action(Command::History { limit: 12 })
        );
    }

    #[test]
    fn ping_with_target_probes_node() {
        assert_eq!(
            route("ping abcd1234"),
            RouteOutcome::Action(Command::PingNode {
                destination: "abcd1234".to_string()
            })
        );
    }

    // ---- pass-through ----

    #[test]
    fn ordinary_messages_pass_to_agent() {
        assert_eq!(route("what's the weather like?"), RouteOutcome::Pass);
        assert_eq!(route("tell me about the mesh"), RouteOutcome::Pass);
    }

    #[test]
    fn questions_mentioning_help_still_pass() {
        assert_eq!(route("can you help me plan a hike?"), RouteOutcome::Pass);
    }

    #[test]
    fn ping_inside_sentence_passes() {
        assert_eq!(route("the ping time is bad"), RouteOutcome::Pass);
    }
}
