//! Turning chat requests into model payloads.
//!
//! A request body is classified exactly once, when it is converted from
//! [`RawChatRequest`] into a [`ChatRequest`]. Everything downstream matches on the
//! variant instead of inspecting the body again.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::RequestError;
use crate::models::content::MessageContent;
use crate::models::message::PromptMessage;
use crate::models::role::Role;
use crate::prompt_template::system_prompt;

/// The `/api/chat` body as it appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChatRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<PromptMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChatRequest", into = "RawChatRequest")]
pub enum ChatRequest {
    /// A new prompt plus the prior turns, answered as a stream
    Prompt {
        prompt: String,
        history: Vec<PromptMessage>,
        conversation_id: Option<Uuid>,
    },
    /// A complete text message list; a leading system message replaces the default instructions
    Messages { messages: Vec<PromptMessage> },
    /// Messages where at least one carries file data, answered in one piece
    Attachments {
        conversation_id: Option<Uuid>,
        messages: Vec<PromptMessage>,
    },
}

impl ChatRequest {
    pub fn is_streaming(&self) -> bool {
        !matches!(self, ChatRequest::Attachments { .. })
    }
}

fn carries_file_data(message: &PromptMessage) -> bool {
    message.content.files().any(|file| !file.data.is_empty())
}

impl TryFrom<RawChatRequest> for ChatRequest {
    type Error = RequestError;

    fn try_from(raw: RawChatRequest) -> Result<Self, Self::Error> {
        let RawChatRequest {
            prompt,
            messages,
            conversation_id,
        } = raw;

        if let Some(messages) = &messages {
            if messages.iter().any(carries_file_data) {
                return Ok(ChatRequest::Attachments {
                    conversation_id,
                    messages: messages.clone(),
                });
            }
        }

        match (prompt, messages) {
            (Some(prompt), history) => Ok(ChatRequest::Prompt {
                prompt,
                history: history.unwrap_or_default(),
                conversation_id,
            }),
            (None, Some(messages)) if messages.is_empty() => Err(RequestError::EmptyMessages),
            (None, Some(messages)) => Ok(ChatRequest::Messages { messages }),
            (None, None) => Err(RequestError::InvalidFormat),
        }
    }
}

impl From<ChatRequest> for RawChatRequest {
    fn from(request: ChatRequest) -> Self {
        match request {
            ChatRequest::Prompt {
                prompt,
                history,
                conversation_id,
            } => RawChatRequest {
                prompt: Some(prompt),
                messages: (!history.is_empty()).then_some(history),
                conversation_id,
            },
            ChatRequest::Messages { messages } => RawChatRequest {
                messages: Some(messages),
                ..Default::default()
            },
            ChatRequest::Attachments {
                conversation_id,
                messages,
            } => RawChatRequest {
                prompt: None,
                messages: Some(messages),
                conversation_id,
            },
        }
    }
}

/// What a provider is asked to answer
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured messages with raw file bytes, answered non-streaming
    Multimodal {
        system: String,
        messages: Vec<PromptMessage>,
    },
    /// A single flattened transcript, answered streaming
    Prompt { system: String, prompt: String },
}

impl Payload {
    pub fn system(&self) -> &str {
        match self {
            Payload::Multimodal { system, .. } | Payload::Prompt { system, .. } => system,
        }
    }
}

/// Build the provider payload for a request. The output depends on nothing but
/// the request, so the same request always yields the same payload.
pub fn assemble(request: &ChatRequest) -> Payload {
    match request {
        ChatRequest::Prompt {
            prompt, history, ..
        } => {
            let prompt = if history.is_empty() {
                prompt.clone()
            } else {
                format!("{}\n\nUser: {}", flatten(history), prompt)
            };
            Payload::Prompt {
                system: system_prompt().to_string(),
                prompt,
            }
        }
        ChatRequest::Messages { messages } => {
            let (system, rest) = split_system(messages);
            Payload::Prompt {
                system,
                prompt: flatten(rest),
            }
        }
        ChatRequest::Attachments { messages, .. } => {
            let (system, rest) = split_system(messages);
            let messages = rest
                .iter()
                .map(|message| PromptMessage {
                    role: message.role,
                    content: MessageContent::Parts(message.content.clone().into_parts()),
                })
                .collect();
            Payload::Multimodal { system, messages }
        }
    }
}

/// A leading system message overrides the default instructions
fn split_system(messages: &[PromptMessage]) -> (String, &[PromptMessage]) {
    match messages.split_first() {
        Some((first, rest)) if first.role == Role::System => (first.content.as_plain_text(), rest),
        _ => (system_prompt().to_string(), messages),
    }
}

/// Render turns as `Role: text` blocks separated by blank lines
pub fn flatten(messages: &[PromptMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role.label(), message.content.as_plain_text()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::ContentPart;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> Result<ChatRequest, RequestError> {
        let raw: RawChatRequest = serde_json::from_value(body).unwrap();
        ChatRequest::try_from(raw)
    }

    #[test]
    fn test_classification() {
        let prompt = parse(json!({"prompt": "What is escrow?"})).unwrap();
        assert!(matches!(prompt, ChatRequest::Prompt { ref history, .. } if history.is_empty()));

        let messages = parse(json!({"messages": [{"role": "user", "content": "hi"}]})).unwrap();
        assert!(matches!(messages, ChatRequest::Messages { .. }));

        let attachments = parse(json!({
            "prompt": "ignored when files are present",
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "read this"},
                    {"type": "file", "data": "JVBERg==", "mimeType": "application/pdf"}
                ]
            }]
        }))
        .unwrap();
        assert!(matches!(attachments, ChatRequest::Attachments { .. }));
        assert!(!attachments.is_streaming());

        assert_eq!(parse(json!({})), Err(RequestError::InvalidFormat));
        assert_eq!(
            parse(json!({"messages": []})),
            Err(RequestError::EmptyMessages)
        );
    }

    #[test]
    fn test_file_part_without_data_is_not_an_attachment() {
        let request = parse(json!({
            "messages": [{
                "role": "user",
                "content": [{"type": "file", "data": "", "mimeType": "application/pdf"}]
            }]
        }))
        .unwrap();
        assert!(matches!(request, ChatRequest::Messages { .. }));
    }

    #[test]
    fn test_prompt_flattens_history() {
        let request = ChatRequest::Prompt {
            prompt: "And the deposit?".into(),
            history: vec![
                PromptMessage::user("I'm renting an apartment"),
                PromptMessage::assistant("Happy to help with your rental."),
            ],
            conversation_id: None,
        };
        match assemble(&request) {
            Payload::Prompt { system, prompt } => {
                assert_eq!(system, system_prompt());
                assert_eq!(
                    prompt,
                    "User: I'm renting an apartment\n\nAssistant: Happy to help with your rental.\n\nUser: And the deposit?"
                );
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_prompt_without_history_is_verbatim() {
        let request = ChatRequest::Prompt {
            prompt: "What is a deed?".into(),
            history: vec![],
            conversation_id: None,
        };
        assert_eq!(
            assemble(&request),
            Payload::Prompt {
                system: system_prompt().to_string(),
                prompt: "What is a deed?".into()
            }
        );
    }

    #[test]
    fn test_leading_system_message_overrides() {
        let request = ChatRequest::Messages {
            messages: vec![
                PromptMessage::system("You are a title generator."),
                PromptMessage::user("My landlord kept my deposit"),
            ],
        };
        assert_eq!(
            assemble(&request),
            Payload::Prompt {
                system: "You are a title generator.".into(),
                prompt: "User: My landlord kept my deposit".into()
            }
        );
    }

    #[test]
    fn test_attachments_become_parts() {
        let request = ChatRequest::Attachments {
            conversation_id: Some(Uuid::new_v4()),
            messages: vec![
                PromptMessage::user("Earlier question"),
                PromptMessage::assistant("Earlier answer"),
                PromptMessage::user(vec![
                    ContentPart::text("Please review"),
                    ContentPart::file(b"%PDF-1.4".to_vec(), "application/pdf", None),
                ]),
            ],
        };
        match assemble(&request) {
            Payload::Multimodal { system, messages } => {
                assert_eq!(system, system_prompt());
                assert_eq!(messages.len(), 3);
                assert_eq!(
                    messages[0].content,
                    MessageContent::Parts(vec![ContentPart::text("Earlier question")])
                );
                let file = messages[2].content.files().next().unwrap();
                assert_eq!(file.data, b"%PDF-1.4");
                assert_eq!(file.mime_type, "application/pdf");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let request = ChatRequest::Prompt {
            prompt: "Explain title insurance".into(),
            history: vec![PromptMessage::user("Buying a house"), PromptMessage::assistant("Great")],
            conversation_id: Some(Uuid::new_v4()),
        };
        assert_eq!(assemble(&request), assemble(&request.clone()));
    }

    #[test]
    fn test_wire_round_trip() {
        let request = ChatRequest::Prompt {
            prompt: "Next question".into(),
            history: vec![PromptMessage::user("First")],
            conversation_id: Some(Uuid::nil()),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["prompt"], "Next question");
        assert_eq!(value["conversationId"], Uuid::nil().to_string());
        assert_eq!(value["messages"][0]["content"], "First");

        let back: ChatRequest = serde_json::from_value(value).unwrap();
        assert_eq!(back, request);
    }
}
