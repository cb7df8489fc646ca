//! Conversation context assembly for the agent

use crate::db::{MessageRepo, MessageRole};
use crate::Result;

/// Default number of history messages included in the prompt
pub const DEFAULT_CONTEXT_MESSAGES: usize = 10;

/// Builds the prompt sent to the model from stored history
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    max_messages: usize,
}

impl ContextBuilder {
    /// Create a builder including at most `max_messages` of history
    #[must_use]
    pub const fn new(max_messages: usize) -> Self {
        Self { max_messages }
    }

    /// Format the prompt for `current` within its conversation
    ///
    /// With no stored history the message passes through untouched.
    /// Otherwise recent exchanges are prefixed so the model can follow
    /// the thread, and the reply is steered short for the mesh.
    ///
    /// # Errors
    ///
    /// Returns error if history cannot be read
    pub fn build(
        &self,
        messages: &MessageRepo,
        conversation_id: &str,
        current: &str,
    ) -> Result<String> {
        let history = messages.recent(conversation_id, self.max_messages)?;
        if history.is_empty() {
            return Ok(current.to_string());
        }

        let mut prompt = String::from("Recent conversation:\n");
        for message in &history {
            let role = match message.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
            };
            let time = message.created_at.format("%H:%M");
            prompt.push_str(&format!("[{time}] {role}: {}\n", message.content));
        }
        prompt.push_str(&format!(
            "\nCurrent message: {current}\nRespond briefly and directly."
        ));

        Ok(prompt)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_MESSAGES)
    }
}
