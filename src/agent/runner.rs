//! Multi-turn agent loop with tool dispatch

use super::client::{ChatMessage, LlmClient};
use crate::tools::ToolExecutor;
use crate::{Error, Result};

/// Upper bound on model round-trips per reply, to cap API usage
pub const MAX_TOOL_TURNS: usize = 10;

/// Runs one prompt through the model, executing tool calls until the
/// model produces a final text answer
pub struct AgentRunner {
    client: LlmClient,
    executor: ToolExecutor,
}

impl AgentRunner {
    /// Create a runner from a client and a tool executor
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(client: LlmClient, executor: ToolExecutor) -> Self {
        Self { client, executor }
    }

    /// The configured model identifier
    #[must_use]
    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Produce a reply for `prompt` under `system_prompt`
    ///
    /// Tool calls requested by the model are executed through the
    /// closed-set executor and fed back until the model stops calling
    /// tools or the turn budget runs out. Only the latest text content
    /// is kept, so intermediate narration never reaches the mesh.
    ///
    /// # Errors
    ///
    /// Returns error if the API fails or produces no usable text
    pub async fn run(&self, system_prompt: &str, prompt: &str) -> Result<String> {
        let tools = crate::tools::specs();
        let mut messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(prompt),
        ];
        let mut final_text = String::new();

        for turn in 0..MAX_TOOL_TURNS {
            let choice = self.client.chat(&messages, Some(&tools)).await?;

            if let Some(text) = &choice.message.content
                && !text.is_empty()
            {
                final_text.clone_from(text);
            }

            let wants_tools = choice.finish_reason.as_deref() == Some("tool_calls");
            let Some(tool_calls) = choice.message.tool_calls.filter(|_| wants_tools) else {
                break;
            };

            tracing::debug!(turn, count = tool_calls.len(), "executing tool calls");
            messages.push(ChatMessage::assistant(
                choice.message.content.clone(),
                Some(tool_calls.clone()),
            ));

            for call in &tool_calls {
                let result = self
                    .executor
                    .execute(&call.function.name, &call.function.arguments)
                    .await
                    .unwrap_or_else(|e| format!("Error: {e}"));

                tracing::debug!(
                    tool = %call.function.name,
                    result_len = result.len(),
                    "tool executed"
                );
                messages.push(ChatMessage::tool(&call.id, &result));
            }
        }

        if final_text.is_empty() {
            return Err(Error::Agent("model produced no reply text".to_string()));
        }
        Ok(final_text)
    }
}
