//! System prompt management
//!
//! The prompt lives in `system_prompt.txt` under the data directory so
//! operators can tune it without rebuilding. A default is materialized
//! on first run.

use std::path::Path;

use crate::Result;

/// File name of the editable system prompt
pub const SYSTEM_PROMPT_FILE: &str = "system_prompt.txt";

/// Render the default system prompt for a given wire limit
#[must_use]
pub fn default_prompt(max_message_length: usize) -> String {
    format!(
        "You are MeshBot, an AI assistant that communicates through a LoRa mesh radio network. \
         You are helpful, concise, and knowledgeable. \
         The mesh is a simple text messaging system with some limitations:\n\
         - Keep responses concise and clear (prefer under 200 chars, max {max_message_length})\n\
         - Use newlines for better readability when helpful\n\
         - NO emoji, but you CAN use basic punctuation like - and * for lists and separation\n\
         - Use plain text with good structure\n\
         - Be direct and helpful\n\
         - Use tools ONLY when necessary - prefer direct responses\n\
         - Maximum 1-2 tool calls per message, avoid chains\n\
         - For simple questions, respond directly without tools\n\
         - The get_weather tool makes the HTTP request itself - call it ONCE only\n\
         When users send 'ping', respond with 'pong'\n\
         \n\
         Examples of good formatting:\n\
         Status: Connected * 20 contacts online * 51 messages processed\n\
         Time: 14:30 * Date: 2025-01-15\n\
         Nodes found: 12 online * 8 with names * 4 new today\n"
    )
}

/// Load the system prompt, creating the default file on first run
///
/// # Errors
///
/// Returns error if the data directory or prompt file cannot be
/// created or read
pub fn load_system_prompt(data_dir: &Path, max_message_length: usize) -> Result<String> {
    let path = data_dir.join(SYSTEM_PROMPT_FILE);

    if !path.exists() {
        std::fs::create_dir_all(data_dir)?;
        std::fs::write(&path, default_prompt(max_message_length))?;
        tracing::info!(path = %path.display(), "created default system prompt");
    }

    let prompt = std::fs::read_to_string(&path)?;
    tracing::debug!(path = %path.display(), len = prompt.len(), "loaded system prompt");
    Ok(prompt)
}
