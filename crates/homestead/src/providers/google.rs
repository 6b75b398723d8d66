use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::instrument;

use super::base::{Provider, Usage};
use super::configs::GoogleProviderConfig;
use super::utils::{
    api_error_message, google_response_to_message, google_text, google_usage,
    messages_to_google_spec,
};
use crate::models::message::{Message, PromptMessage};
use crate::protocol::{sse_data, TextStream};

/// Gemini through the Generative Language REST API
pub struct GoogleProvider {
    client: Client,
    config: GoogleProviderConfig,
}

impl GoogleProvider {
    pub fn new(config: GoogleProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self { client, config })
    }

    fn payload(&self, system: &str, messages: &[PromptMessage]) -> Value {
        let mut payload = json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": messages_to_google_spec(messages),
        });
        let mut generation = serde_json::Map::new();
        if let Some(temp) = self.config.temperature {
            generation.insert("temperature".to_string(), json!(temp));
        }
        if let Some(tokens) = self.config.max_tokens {
            generation.insert("maxOutputTokens".to_string(), json!(tokens));
        }
        if !generation.is_empty() {
            payload["generationConfig"] = Value::Object(generation);
        }
        payload
    }

    async fn post(&self, model: &str, method: &str, payload: &Value) -> Result<Response> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Google API key is not configured"))?;
        let url = format!(
            "{}/v1beta/models/{}:{}",
            self.config.host.trim_end_matches('/'),
            model,
            method
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body: Value = response.json().await.unwrap_or(Value::Null);
        Err(anyhow!(
            "Request failed: {}: {}",
            status,
            api_error_message(&body)
        ))
    }
}

#[async_trait]
impl Provider for GoogleProvider {
    #[instrument(skip_all, fields(model = %self.config.multimodal_model(), messages = messages.len()))]
    async fn complete(
        &self,
        system: &str,
        messages: &[PromptMessage],
    ) -> Result<(Message, Usage)> {
        let payload = self.payload(system, messages);
        let response: Value = self
            .post(self.config.multimodal_model(), "generateContent", &payload)
            .await?
            .json()
            .await?;

        let message = google_response_to_message(&response)?;
        let usage = google_usage(&response);
        Ok((message, usage))
    }

    #[instrument(skip_all, fields(model = %self.config.model, messages = messages.len()))]
    async fn stream(&self, system: &str, messages: &[PromptMessage]) -> Result<TextStream> {
        let payload = self.payload(system, messages);
        let response = self
            .post(&self.config.model, "streamGenerateContent?alt=sse", &payload)
            .await?;
        let mut chunks = sse_data(response.bytes_stream());

        Ok(Box::pin(async_stream::try_stream! {
            while let Some(chunk) = chunks.next().await {
                let chunk: Value = serde_json::from_str(&chunk?)?;
                if chunk.get("error").is_some() {
                    Err::<(), _>(anyhow!("Gemini stream error: {}", api_error_message(&chunk)))?;
                }
                if let Some(text) = google_text(&chunk).filter(|text| !text.is_empty()) {
                    yield text;
                }
            }
        }))
    }
}
