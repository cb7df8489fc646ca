//! Rendering for node registry and history query tools

use crate::db::{Advert, NodeRecord, StoredMessage};
use crate::db::MessageRole;

/// Shorten a public key for display
fn short_key(key: &str) -> String {
    key.chars().take(16).collect()
}

/// Render a node listing
#[must_use]
pub fn format_node_list(nodes: &[NodeRecord]) -> String {
    if nodes.is_empty() {
        return "No nodes found".to_string();
    }

    let mut out = format!("Found {} node(s):", nodes.len());
    for node in nodes {
        let status = if node.is_online { "[on]" } else { "[off]" };
        let name = node
            .name
            .as_deref()
            .map(|n| format!(" ({n})"))
            .unwrap_or_default();
        let adverts = if node.total_adverts > 0 {
            format!(", {} adverts", node.total_adverts)
        } else {
            String::new()
        };
        out.push_str(&format!(
            "\n{status} {}{name} - last seen {}{adverts}",
            short_key(&node.pubkey),
            node.last_seen.format("%Y-%m-%d %H:%M"),
        ));
    }
    out
}

/// Render details of one node
#[must_use]
pub fn format_node_info(node: &NodeRecord) -> String {
    let mut out = format!("Node: {}...", short_key(&node.pubkey));
    if let Some(name) = &node.name {
        out.push_str(&format!("\nName: {name}"));
    }
    out.push_str(&format!(
        "\nStatus: {}",
        if node.is_online { "Online" } else { "Offline" }
    ));
    out.push_str(&format!(
        "\nFirst seen: {}",
        node.first_seen.format("%Y-%m-%d %H:%M")
    ));
    out.push_str(&format!(
        "\nLast seen: {}",
        node.last_seen.format("%Y-%m-%d %H:%M")
    ));
    if let Some(last_advert) = node.last_advert {
        out.push_str(&format!(
            "\nLast advert: {}",
            last_advert.format("%Y-%m-%d %H:%M")
        ));
    }
    out.push_str(&format!("\nTotal adverts: {}", node.total_adverts));
    out
}

/// Render an advert history listing
#[must_use]
pub fn format_adverts(adverts: &[Advert]) -> String {
    if adverts.is_empty() {
        return "No advertisements found".to_string();
    }

    let mut out = format!("Found {} advertisement(s):", adverts.len());
    for advert in adverts {
        let name = advert
            .node_name
            .as_deref()
            .map(|n| format!(" ({n})"))
            .unwrap_or_default();
        out.push_str(&format!(
            "\n[{}] {}{name}",
            advert.created_at.format("%Y-%m-%d %H:%M:%S"),
            short_key(&advert.node_id),
        ));
    }
    out
}

/// Render recent conversation messages
#[must_use]
pub fn format_conversation(messages: &[StoredMessage], label: &str) -> String {
    if messages.is_empty() {
        return format!("No messages {label}.");
    }

    let mut out = format!("Last {} message(s) {label}:", messages.len());
    for message in messages {
        let role = match message.role {
            MessageRole::User => "User",
            MessageRole::Assistant => "Bot",
        };
        out.push_str(&format!("\n{role}: {}", message.content));
    }
    out
}
