use anyhow::{anyhow, Result};
use serde_json::{json, Value};

use crate::models::content::{ContentPart, FilePart, MessageContent};
use crate::models::message::{Message, PromptMessage};
use crate::models::role::Role;

use super::base::Usage;

/// Convert prompt messages to OpenAI's chat message specification.
///   plain text stays a string, parts become typed content blocks
pub fn messages_to_openai_spec(messages: &[PromptMessage]) -> Vec<Value> {
    messages
        .iter()
        .filter(|message| !message.content.is_empty())
        .map(|message| {
            let content = match &message.content {
                MessageContent::Text(text) => json!(text),
                MessageContent::Parts(parts) => Value::Array(
                    parts
                        .iter()
                        .map(|part| match part {
                            ContentPart::Text(text) => json!({"type": "text", "text": text.text}),
                            ContentPart::File(file) => convert_file_openai(file),
                        })
                        .collect(),
                ),
            };
            json!({
                "role": message.role,
                "content": content,
            })
        })
        .collect()
}

fn convert_file_openai(file: &FilePart) -> Value {
    if file.is_image() {
        json!({
            "type": "image_url",
            "image_url": { "url": file.data_url() }
        })
    } else {
        json!({
            "type": "file",
            "file": {
                "filename": file.name.clone().unwrap_or_else(|| "document".to_string()),
                "file_data": file.data_url(),
            }
        })
    }
}

/// Convert prompt messages to Gemini `contents`. Gemini only knows `user` and
/// `model`, so stray system turns are sent as user turns.
pub fn messages_to_google_spec(messages: &[PromptMessage]) -> Vec<Value> {
    messages
        .iter()
        .filter(|message| !message.content.is_empty())
        .map(|message| {
            let role = match message.role {
                Role::Assistant => "model",
                Role::User | Role::System => "user",
            };
            let parts: Vec<Value> = message
                .content
                .clone()
                .into_parts()
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => json!({"text": text.text}),
                    ContentPart::File(file) => json!({
                        "inline_data": {
                            "mime_type": file.mime_type,
                            "data": file.base64(),
                        }
                    }),
                })
                .collect();
            json!({ "role": role, "parts": parts })
        })
        .collect()
}

/// Convert OpenAI's API response to an assistant message
pub fn openai_response_to_message(response: &Value) -> Result<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| anyhow!("No choices in response"))?;

    let text = original
        .get("content")
        .and_then(|content| content.as_str())
        .unwrap_or_default();
    Ok(Message::assistant(text))
}

/// Text of one streamed OpenAI chunk, if it carries any
pub fn openai_delta_text(chunk: &Value) -> Option<String> {
    chunk
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|text| !text.is_empty())
        .map(String::from)
}

pub fn openai_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };
    let field = |name: &str| usage.get(name).and_then(|v| v.as_i64()).map(|v| v as i32);
    Usage::new(
        field("prompt_tokens"),
        field("completion_tokens"),
        field("total_tokens"),
    )
}

/// Concatenated text of the first Gemini candidate
pub fn google_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    Some(text)
}

pub fn google_response_to_message(response: &Value) -> Result<Message> {
    if let Some(reason) = response
        .get("promptFeedback")
        .and_then(|feedback| feedback.get("blockReason"))
        .and_then(|reason| reason.as_str())
    {
        return Err(anyhow!("Prompt was blocked: {}", reason));
    }
    let text = google_text(response).ok_or_else(|| anyhow!("No candidates in response"))?;
    Ok(Message::assistant(text))
}

pub fn google_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usageMetadata") else {
        return Usage::default();
    };
    let field = |name: &str| usage.get(name).and_then(|v| v.as_i64()).map(|v| v as i32);
    Usage::new(
        field("promptTokenCount"),
        field("candidatesTokenCount"),
        field("totalTokenCount"),
    )
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}

/// Pull a readable message out of an API error body
pub fn api_error_message(body: &Value) -> String {
    body.get("error")
        .and_then(|error| error.get("message").or(Some(error)))
        .and_then(|message| message.as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_to_openai_spec() {
        let spec = messages_to_openai_spec(&[PromptMessage::user("Hello")]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
    }

    #[test]
    fn test_messages_to_openai_spec_with_files() {
        let message = PromptMessage::user(vec![
            ContentPart::text("What does this say?"),
            ContentPart::file(vec![0x89, 0x50], "image/png", Some("photo.png".into())),
            ContentPart::file(b"%PDF".to_vec(), "application/pdf", Some("lease.pdf".into())),
        ]);
        let spec = messages_to_openai_spec(&[message, PromptMessage::user("   ")]);

        assert_eq!(spec.len(), 1);
        let content = spec[0]["content"].as_array().unwrap();
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,iVA=");
        assert_eq!(content[2]["file"]["filename"], "lease.pdf");
        assert_eq!(content[2]["file"]["file_data"], "data:application/pdf;base64,JVBERg==");
    }

    #[test]
    fn test_messages_to_google_spec() {
        let spec = messages_to_google_spec(&[
            PromptMessage::user("Earlier"),
            PromptMessage::assistant("Reply"),
            PromptMessage::user(vec![ContentPart::file(
                b"%PDF".to_vec(),
                "application/pdf",
                None,
            )]),
        ]);

        assert_eq!(spec[0], json!({"role": "user", "parts": [{"text": "Earlier"}]}));
        assert_eq!(spec[1]["role"], "model");
        assert_eq!(
            spec[2]["parts"][0],
            json!({"inline_data": {"mime_type": "application/pdf", "data": "JVBERg=="}})
        );
    }

    #[test]
    fn test_openai_response_to_message_text() -> Result<()> {
        let response = json!({
            "choices": [{
                "role": "assistant",
                "message": {"content": "Hello from the model"}
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 25, "total_tokens": 35}
        });

        let message = openai_response_to_message(&response)?;
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Hello from the model");
        assert_eq!(openai_usage(&response), Usage::new(Some(10), Some(25), Some(35)));
        Ok(())
    }

    #[test]
    fn test_openai_response_without_choices() {
        assert!(openai_response_to_message(&json!({"object": "error"})).is_err());
    }

    #[test]
    fn test_openai_delta_text() {
        let chunk = json!({"choices": [{"delta": {"content": "Hel"}}]});
        assert_eq!(openai_delta_text(&chunk).as_deref(), Some("Hel"));
        let role_only = json!({"choices": [{"delta": {"role": "assistant"}}]});
        assert_eq!(openai_delta_text(&role_only), None);
        let empty = json!({"choices": [{"delta": {"content": ""}}]});
        assert_eq!(openai_delta_text(&empty), None);
    }

    #[test]
    fn test_google_response() -> Result<()> {
        let response = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "A deed "}, {"text": "transfers title."}]}
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10}
        });
        assert_eq!(google_response_to_message(&response)?.text(), "A deed transfers title.");
        assert_eq!(google_usage(&response).total_tokens, Some(10));

        let blocked = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let error = google_response_to_message(&blocked).unwrap_err();
        assert!(error.to_string().contains("SAFETY"));
        Ok(())
    }

    #[test]
    fn test_check_openai_context_length_error() {
        let error = json!({
            "code": "context_length_exceeded",
            "message": "This message is too long"
        });
        let result = check_openai_context_length_error(&error);
        assert!(result.is_some());
        assert_eq!(
            result.unwrap().to_string(),
            "Context length exceeded. Message: This message is too long"
        );

        let error = json!({"code": "other_error", "message": "Some other error"});
        assert!(check_openai_context_length_error(&error).is_none());
    }

    #[test]
    fn test_api_error_message() {
        assert_eq!(
            api_error_message(&json!({"error": {"message": "Invalid key", "code": 401}})),
            "Invalid key"
        );
        assert_eq!(api_error_message(&json!({"error": "quota"})), "quota");
    }
}
