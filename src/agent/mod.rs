//! LLM agent: chat-completions client and the tool-calling loop

mod client;
mod runner;

pub use client::{ChatChoice, ChatMessage, LlmClient, ResponseMessage, ToolCall, ToolCallFunction};
pub use runner::{AgentRunner, MAX_TOOL_TURNS};
