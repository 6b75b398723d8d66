use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::Store;
use crate::auth::Actor;
use crate::config::BackendConfig;
use crate::errors::{StoreError, StoreResult};
use crate::models::content::MessageContent;
use crate::models::conversation::Conversation;
use crate::models::message::{Message, MessageMetadata};
use crate::models::role::Role;

/// Row of the `messages` table. Content is a single string column, so structured
/// content travels as JSON text.
#[derive(Debug, Serialize, Deserialize)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    role: Role,
    content: String,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<MessageMetadata>,
}

impl MessageRow {
    fn from_message(conversation_id: Uuid, message: &Message) -> Self {
        Self {
            id: message.id,
            conversation_id,
            role: message.role,
            content: message.content.to_stored(),
            created_at: message.created_at,
            metadata: message.metadata.clone(),
        }
    }

    fn into_message(self) -> Message {
        Message {
            id: self.id,
            role: self.role,
            content: MessageContent::from_stored(&self.content),
            created_at: self.created_at,
            metadata: self.metadata,
        }
    }
}

/// Store backed by the hosted Postgres REST interface. Row level security on the
/// backend keys off the actor's access token; every query also filters by owner.
pub struct RestStore {
    client: Client,
    config: BackendConfig,
}

impl RestStore {
    pub fn new(config: BackendConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    fn request(
        &self,
        method: reqwest::Method,
        actor: &Actor,
        table: &str,
        filters: &[(&str, String)],
    ) -> StoreResult<RequestBuilder> {
        let (url, key) = self
            .config
            .credentials()
            .map_err(StoreError::NotConfigured)?;
        let query = serde_urlencoded::to_string(filters)?;
        let url = if query.is_empty() {
            format!("{}/rest/v1/{}", url, table)
        } else {
            format!("{}/rest/v1/{}?{}", url, table, query)
        };
        Ok(self
            .client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(&actor.access_token)
            .header("Prefer", "return=representation"))
    }

    async fn rows<T: DeserializeOwned>(request: RequestBuilder) -> StoreResult<Vec<T>> {
        let response = check(request.send().await?).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fail with NotFound unless the conversation exists and belongs to the actor
    async fn ensure_owned(&self, actor: &Actor, conversation_id: Uuid) -> StoreResult<()> {
        let request = self.request(
            reqwest::Method::GET,
            actor,
            "conversations",
            &[
                ("select", "id".to_string()),
                ("id", eq(conversation_id)),
                ("user_id", eq(actor.id)),
            ],
        )?;
        let rows: Vec<serde_json::Value> = Self::rows(request).await?;
        if rows.is_empty() {
            return Err(not_found(conversation_id));
        }
        Ok(())
    }
}

fn eq<T: std::fmt::Display>(value: T) -> String {
    format!("eq.{}", value)
}

fn not_found(conversation_id: Uuid) -> StoreError {
    StoreError::NotFound(format!("conversation {}", conversation_id))
}

async fn check(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(StoreError::Unauthorized);
    }
    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| "Unknown error".to_string());
    Err(StoreError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Store for RestStore {
    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    async fn insert_conversation(&self, actor: &Actor, title: &str) -> StoreResult<Conversation> {
        let request = self
            .request(reqwest::Method::POST, actor, "conversations", &[])?
            .json(&json!({ "user_id": actor.id, "title": title }));
        let mut rows: Vec<Conversation> = Self::rows(request).await?;
        rows.pop()
            .ok_or_else(|| StoreError::NotFound("inserted conversation".to_string()))
    }

    #[instrument(skip_all, fields(actor = %actor.id))]
    async fn list_conversations(&self, actor: &Actor) -> StoreResult<Vec<Conversation>> {
        let request = self.request(
            reqwest::Method::GET,
            actor,
            "conversations",
            &[
                ("select", "*".to_string()),
                ("user_id", eq(actor.id)),
                ("order", "updated_at.desc,created_at.desc".to_string()),
            ],
        )?;
        Self::rows(request).await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    async fn touch_conversation(&self, actor: &Actor, conversation_id: Uuid) -> StoreResult<()> {
        let request = self
            .request(
                reqwest::Method::PATCH,
                actor,
                "conversations",
                &[("id", eq(conversation_id)), ("user_id", eq(actor.id))],
            )?
            .json(&json!({ "updated_at": Utc::now() }));
        let rows: Vec<Conversation> = Self::rows(request).await?;
        if rows.is_empty() {
            return Err(not_found(conversation_id));
        }
        Ok(())
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    async fn delete_conversation(&self, actor: &Actor, conversation_id: Uuid) -> StoreResult<()> {
        let request = self.request(
            reqwest::Method::DELETE,
            actor,
            "conversations",
            &[("id", eq(conversation_id)), ("user_id", eq(actor.id))],
        )?;
        let rows: Vec<Conversation> = Self::rows(request).await?;
        if rows.is_empty() {
            return Err(not_found(conversation_id));
        }

        // The foreign key cascades on the backend; this sweeps anything left over.
        let request = self.request(
            reqwest::Method::DELETE,
            actor,
            "messages",
            &[("conversation_id", eq(conversation_id))],
        )?;
        let removed: Vec<serde_json::Value> = Self::rows(request).await?;
        debug!(removed = removed.len(), "Deleted conversation messages");
        Ok(())
    }

    #[instrument(skip(self, actor, message), fields(actor = %actor.id, message = %message.id))]
    async fn insert_message(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
        message: &Message,
    ) -> StoreResult<Message> {
        self.ensure_owned(actor, conversation_id).await?;

        let request = self
            .request(reqwest::Method::POST, actor, "messages", &[])?
            .json(&[MessageRow::from_message(conversation_id, message)]);
        let mut rows: Vec<MessageRow> = Self::rows(request).await?;
        let saved = rows
            .pop()
            .map(MessageRow::into_message)
            .ok_or_else(|| StoreError::NotFound(format!("inserted message {}", message.id)))?;

        self.touch_conversation(actor, conversation_id).await?;
        Ok(saved)
    }

    #[instrument(skip(self, actor), fields(actor = %actor.id))]
    async fn list_messages(
        &self,
        actor: &Actor,
        conversation_id: Uuid,
    ) -> StoreResult<Vec<Message>> {
        self.ensure_owned(actor, conversation_id).await?;

        let request = self.request(
            reqwest::Method::GET,
            actor,
            "messages",
            &[
                ("select", "*".to_string()),
                ("conversation_id", eq(conversation_id)),
                ("order", "created_at.asc".to_string()),
            ],
        )?;
        let rows: Vec<MessageRow> = Self::rows(request).await?;
        Ok(rows.into_iter().map(MessageRow::into_message).collect())
    }
}
