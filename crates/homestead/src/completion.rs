use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::assembler::{assemble, ChatRequest, Payload};
use crate::models::message::PromptMessage;
use crate::protocol::TextStream;
use crate::providers::base::Provider;

/// An answer to a chat request: whole, or as text deltas
pub enum Reply {
    Text(String),
    Stream(TextStream),
}

impl Reply {
    /// Wait for the full text, concatenating deltas
    pub async fn collect(self) -> Result<String> {
        match self {
            Reply::Text(text) => Ok(text),
            Reply::Stream(stream) => stream.try_collect().await,
        }
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reply::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Reply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Anything that can answer a [`ChatRequest`]
#[async_trait]
pub trait Completion: Send + Sync {
    async fn respond(&self, request: ChatRequest) -> Result<Reply>;
}

/// Answers requests in process: assemble the payload, then call the provider
pub struct ProviderCompletion {
    provider: Arc<dyn Provider>,
}

impl ProviderCompletion {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Completion for ProviderCompletion {
    #[instrument(skip_all, fields(streaming = request.is_streaming()))]
    async fn respond(&self, request: ChatRequest) -> Result<Reply> {
        match assemble(&request) {
            Payload::Multimodal { system, messages } => {
                let (message, usage) = self.provider.complete(&system, &messages).await?;
                debug!(?usage, "Completion usage");
                Ok(Reply::Text(message.text()))
            }
            Payload::Prompt { system, prompt } => {
                let stream = self
                    .provider
                    .stream(&system, &[PromptMessage::user(prompt)])
                    .await?;
                Ok(Reply::Stream(stream))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::ContentPart;
    use crate::prompt_template::system_prompt;
    use crate::providers::mock::MockProvider;

    #[tokio::test]
    async fn test_prompt_is_streamed() {
        let provider = MockProvider::new(vec!["An easement is a right of use."]);
        let completion = ProviderCompletion::new(Arc::new(provider.clone()));

        let reply = completion
            .respond(ChatRequest::Prompt {
                prompt: "What is an easement?".into(),
                history: vec![],
                conversation_id: None,
            })
            .await
            .unwrap();
        assert!(matches!(reply, Reply::Stream(_)));
        assert_eq!(reply.collect().await.unwrap(), "An easement is a right of use.");

        let calls = provider.calls();
        assert!(calls[0].streamed);
        assert_eq!(calls[0].system, system_prompt());
        assert_eq!(calls[0].messages, vec![PromptMessage::user("What is an easement?")]);
    }

    #[tokio::test]
    async fn test_attachments_are_answered_whole() {
        let provider = MockProvider::new(vec!["This deed transfers the property."]);
        let completion = ProviderCompletion::new(Arc::new(provider.clone()));

        let reply = completion
            .respond(ChatRequest::Attachments {
                conversation_id: None,
                messages: vec![PromptMessage::user(vec![
                    ContentPart::text("Read this"),
                    ContentPart::file(b"%PDF".to_vec(), "application/pdf", None),
                ])],
            })
            .await
            .unwrap();
        match reply {
            Reply::Text(text) => assert_eq!(text, "This deed transfers the property."),
            other => panic!("expected text, got {:?}", other),
        }
        assert!(!provider.calls()[0].streamed);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = MockProvider::new(Vec::<String>::new());
        provider.push_error("upstream unavailable");
        let completion = ProviderCompletion::new(Arc::new(provider));

        let result = completion
            .respond(ChatRequest::Messages {
                messages: vec![PromptMessage::user("hi")],
            })
            .await;
        assert!(result.is_err());
    }
}
