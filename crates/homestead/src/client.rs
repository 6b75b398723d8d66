use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::assembler::ChatRequest;
use crate::completion::{Completion, Reply};
use crate::protocol::{chat_events, sse_data};

pub const API_URL_VAR: &str = "HOMESTEAD_API_URL";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

#[derive(Debug, Deserialize)]
struct TextBody {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Answers requests by calling a running chat server's `/api/chat`
pub struct HttpCompletion {
    client: Client,
    base_url: String,
}

impl HttpCompletion {
    pub fn new<S: Into<String>>(base_url: S) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Base url from `HOMESTEAD_API_URL`, falling back to the local default
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(API_URL_VAR).unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Completion for HttpCompletion {
    #[instrument(skip_all, fields(streaming = request.is_streaming()))]
    async fn respond(&self, request: ChatRequest) -> Result<Reply> {
        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Could not reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(anyhow!("Chat request failed ({}): {}", status, message));
        }

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.starts_with("application/json"))
            .unwrap_or(false);

        if is_json {
            let body: TextBody = response.json().await?;
            debug!(length = body.text.len(), "Received complete reply");
            Ok(Reply::Text(body.text))
        } else {
            Ok(Reply::Stream(chat_events(sse_data(response.bytes_stream()))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::ContentPart;
    use crate::models::message::PromptMessage;
    use futures::TryStreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_streamed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"prompt": "What is HOA?"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "data: {\"text\":\"A homeowners \"}\n\ndata: {\"text\":\"association.\"}\n\ndata: [DONE]\n\n",
                "text/event-stream",
            ))
            .mount(&server)
            .await;

        let client = HttpCompletion::new(format!("{}/", server.uri())).unwrap();
        let reply = client
            .respond(ChatRequest::Prompt {
                prompt: "What is HOA?".into(),
                history: vec![],
                conversation_id: None,
            })
            .await
            .unwrap();
        let Reply::Stream(stream) = reply else {
            panic!("expected a stream");
        };
        let deltas: Vec<String> = stream.try_collect().await.unwrap();
        assert_eq!(deltas, vec!["A homeowners ", "association."]);
    }

    #[tokio::test]
    async fn test_json_reply_for_attachments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"text": "Your lease runs 12 months."})),
            )
            .mount(&server)
            .await;

        let client = HttpCompletion::new(server.uri()).unwrap();
        let reply = client
            .respond(ChatRequest::Attachments {
                conversation_id: None,
                messages: vec![PromptMessage::user(vec![ContentPart::file(
                    b"lease".to_vec(),
                    "text/plain",
                    None,
                )])],
            })
            .await
            .unwrap();
        assert_eq!(reply.collect().await.unwrap(), "Your lease runs 12 months.");
    }

    #[tokio::test]
    async fn test_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(json!({"error": "Failed to generate response"})),
            )
            .mount(&server)
            .await;

        let client = HttpCompletion::new(server.uri()).unwrap();
        let error = client
            .respond(ChatRequest::Messages {
                messages: vec![PromptMessage::user("hi")],
            })
            .await
            .unwrap_err();
        assert!(error.to_string().contains("Failed to generate response"));
    }
}
