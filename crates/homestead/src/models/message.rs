use super::content::MessageContent;
use super::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Annotations a model answer can carry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disclaimer: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One turn of a conversation, to or from the LLM
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: MessageContent,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    /// Create a message with a fresh id and the current timestamp
    pub fn new<C: Into<MessageContent>>(role: Role, content: C) -> Self {
        Message {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            metadata: None,
        }
    }

    pub fn user<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::System, content)
    }

    /// Reuse an existing identifier, e.g. when a streamed answer is finalized
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Attach metadata. Only assistant messages carry metadata; on other roles this is a no-op.
    pub fn with_metadata(mut self, metadata: MessageMetadata) -> Self {
        if self.role == Role::Assistant {
            self.metadata = Some(metadata);
        }
        self
    }

    pub fn text(&self) -> String {
        self.content.as_plain_text()
    }
}

/// The role and content of a message, which is all a model ever sees of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl PromptMessage {
    pub fn new<C: Into<MessageContent>>(role: Role, content: C) -> Self {
        PromptMessage {
            role,
            content: content.into(),
        }
    }

    pub fn user<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system<C: Into<MessageContent>>(content: C) -> Self {
        Self::new(Role::System, content)
    }
}

impl From<&Message> for PromptMessage {
    fn from(message: &Message) -> Self {
        PromptMessage {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_only_on_assistant() {
        let metadata = MessageMetadata {
            topic: Some("landlord-tenant".into()),
            disclaimer: Some(true),
            ..Default::default()
        };

        let user = Message::user("hi").with_metadata(metadata.clone());
        assert!(user.metadata.is_none());

        let assistant = Message::assistant("hello").with_metadata(metadata.clone());
        assert_eq!(assistant.metadata, Some(metadata));
    }

    #[test]
    fn test_with_id_keeps_lineage() {
        let streaming = Message::assistant("");
        let final_message = Message::assistant("done").with_id(streaming.id);
        assert_eq!(final_message.id, streaming.id);
    }

    #[test]
    fn test_serialization_skips_empty_metadata() {
        let message = Message::user("What is a lease?");
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("metadata").is_none());
        assert_eq!(value["role"], "user");
        assert_eq!(value["content"], "What is a lease?");
    }
}
