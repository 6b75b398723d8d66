use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::message::{Message, PromptMessage};
use crate::protocol::TextStream;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: total_tokens.or(match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            }),
        }
    }
}

/// Base trait for hosted model APIs (OpenAI, Gemini)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate a full answer in one response. Messages may carry file parts.
    async fn complete(&self, system: &str, messages: &[PromptMessage])
        -> Result<(Message, Usage)>;

    /// Generate an answer as a stream of text deltas
    async fn stream(&self, system: &str, messages: &[PromptMessage]) -> Result<TextStream>;
}
