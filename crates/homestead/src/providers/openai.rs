use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::instrument;

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    api_error_message, check_openai_context_length_error, messages_to_openai_spec,
    openai_delta_text, openai_response_to_message, openai_usage,
};
use crate::models::message::{Message, PromptMessage};
use crate::protocol::{sse_data, TextStream};

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn payload(&self, system: &str, messages: &[PromptMessage], stream: bool) -> Value {
        let mut messages_array = vec![json!({
            "role": "system",
            "content": system
        })];
        messages_array.extend(messages_to_openai_spec(messages));

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });
        if let Some(object) = payload.as_object_mut() {
            if stream {
                object.insert("stream".to_string(), json!(true));
            }
            if let Some(temp) = self.config.temperature {
                object.insert("temperature".to_string(), json!(temp));
            }
            if let Some(tokens) = self.config.max_tokens {
                object.insert("max_tokens".to_string(), json!(tokens));
            }
        }
        payload
    }

    async fn post(&self, payload: &Value) -> Result<Response> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("OpenAI API key is not configured"))?;
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => {
                let body: Value = response.json().await.unwrap_or(Value::Null);
                if let Some(err) = body
                    .get("error")
                    .and_then(check_openai_context_length_error)
                {
                    return Err(err.into());
                }
                Err(anyhow!(
                    "Request failed: {}: {}",
                    status,
                    api_error_message(&body)
                ))
            }
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    #[instrument(skip_all, fields(model = %self.config.model, messages = messages.len()))]
    async fn complete(
        &self,
        system: &str,
        messages: &[PromptMessage],
    ) -> Result<(Message, Usage)> {
        let payload = self.payload(system, messages, false);
        let response: Value = self.post(&payload).await?.json().await?;

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let message = openai_response_to_message(&response)?;
        let usage = openai_usage(&response);
        Ok((message, usage))
    }

    #[instrument(skip_all, fields(model = %self.config.model, messages = messages.len()))]
    async fn stream(&self, system: &str, messages: &[PromptMessage]) -> Result<TextStream> {
        let payload = self.payload(system, messages, true);
        let response = self.post(&payload).await?;
        let mut chunks = sse_data(response.bytes_stream());

        Ok(Box::pin(async_stream::try_stream! {
            while let Some(chunk) = chunks.next().await {
                let chunk: Value = serde_json::from_str(&chunk?)?;
                if let Some(error) = chunk.get("error") {
                    Err::<(), _>(anyhow!("OpenAI stream error: {}", api_error_message(&json!({"error": error}))))?;
                }
                if let Some(text) = openai_delta_text(&chunk) {
                    yield text;
                }
            }
        }))
    }
}
