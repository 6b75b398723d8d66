use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPart {
    pub text: String,
}

/// A file attached to a message. The bytes travel as base64 on every wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FilePart {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// The file as a `data:` URL, as used by OpenAI style content blocks
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, base64_bytes::encode(&self.data))
    }

    pub fn base64(&self) -> String {
        base64_bytes::encode(&self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
/// One typed block of a multi-part message
pub enum ContentPart {
    Text(TextPart),
    File(FilePart),
}

impl ContentPart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentPart::Text(TextPart { text: text.into() })
    }

    pub fn file<T: Into<String>>(data: Vec<u8>, mime_type: T, name: Option<String>) -> Self {
        ContentPart::File(FilePart {
            data,
            mime_type: mime_type.into(),
            name,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentPart::Text(part) => Some(&part.text),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&FilePart> {
        match self {
            ContentPart::File(file) => Some(file),
            _ => None,
        }
    }
}

/// The body of a message: either plain text or an ordered list of typed parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// True for blank text or a part list with nothing in it
    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.trim().is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }

    pub fn has_files(&self) -> bool {
        self.files().next().is_some()
    }

    pub fn files(&self) -> impl Iterator<Item = &FilePart> {
        let parts: &[ContentPart] = match self {
            MessageContent::Parts(parts) => parts,
            MessageContent::Text(_) => &[],
        };
        parts.iter().filter_map(ContentPart::as_file)
    }

    /// Flatten the content into text, describing attachments by name and type
    pub fn as_plain_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .map(|part| match part {
                    ContentPart::Text(text) => text.text.clone(),
                    ContentPart::File(file) => match &file.name {
                        Some(name) => format!("[attached file: {} ({})]", name, file.mime_type),
                        None => format!("[attached file ({})]", file.mime_type),
                    },
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Normalize to a list of parts, wrapping plain text in a single text part
    pub fn into_parts(self) -> Vec<ContentPart> {
        match self {
            MessageContent::Text(text) => vec![ContentPart::text(text)],
            MessageContent::Parts(parts) => parts,
        }
    }

    /// Append a streamed delta. Only plain text grows while streaming.
    pub fn push_text(&mut self, delta: &str) {
        match self {
            MessageContent::Text(text) => text.push_str(delta),
            MessageContent::Parts(parts) => match parts.last_mut() {
                Some(ContentPart::Text(last)) => last.text.push_str(delta),
                _ => parts.push(ContentPart::text(delta)),
            },
        }
    }

    /// Encoding used for the string `content` column of the hosted store
    pub fn to_stored(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => {
                serde_json::to_string(parts).unwrap_or_else(|_| self.as_plain_text())
            }
        }
    }

    /// Reverse of [`MessageContent::to_stored`]. Anything that is not a JSON array of
    /// typed parts is plain text.
    pub fn from_stored(stored: &str) -> Self {
        if stored.trim_start().starts_with('[') {
            if let Ok(parts) = serde_json::from_str::<Vec<ContentPart>>(stored) {
                return MessageContent::Parts(parts);
            }
        }
        MessageContent::Text(stored.to_string())
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<Vec<ContentPart>> for MessageContent {
    fn from(parts: Vec<ContentPart>) -> Self {
        MessageContent::Parts(parts)
    }
}

pub(crate) mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn encode(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parts_wire_format() {
        let content = MessageContent::Parts(vec![
            ContentPart::text("Please review"),
            ContentPart::file(b"%PDF-1.4".to_vec(), "application/pdf", None),
        ]);

        let value = serde_json::to_value(&content).unwrap();
        assert_eq!(
            value,
            json!([
                {"type": "text", "text": "Please review"},
                {"type": "file", "data": "JVBERi0xLjQ=", "mimeType": "application/pdf"}
            ])
        );

        let decoded: MessageContent = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, content);
        assert!(decoded.has_files());
    }

    #[test]
    fn test_plain_string_is_text() {
        let content: MessageContent = serde_json::from_value(json!("What is a lease?")).unwrap();
        assert_eq!(content, MessageContent::from("What is a lease?"));
        assert!(!content.has_files());
    }

    #[test]
    fn test_invalid_base64_is_rejected() {
        let result = serde_json::from_value::<MessageContent>(json!([
            {"type": "file", "data": "not base64!", "mimeType": "application/pdf"}
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_stored_encoding() {
        let parts = MessageContent::Parts(vec![
            ContentPart::text("hi"),
            ContentPart::file(vec![1, 2, 3], "image/png", Some("plan.png".into())),
        ]);
        assert_eq!(MessageContent::from_stored(&parts.to_stored()), parts);

        let text = MessageContent::from("[1, 2] is not a part list");
        assert_eq!(MessageContent::from_stored(&text.to_stored()), text);
    }

    #[test]
    fn test_is_empty() {
        assert!(MessageContent::from("   ").is_empty());
        assert!(MessageContent::Parts(vec![]).is_empty());
        assert!(!MessageContent::from("hello").is_empty());
    }

    #[test]
    fn test_plain_text_describes_files() {
        let content = MessageContent::Parts(vec![
            ContentPart::text("See attached"),
            ContentPart::file(vec![0], "application/pdf", Some("lease.pdf".into())),
        ]);
        assert_eq!(
            content.as_plain_text(),
            "See attached\n[attached file: lease.pdf (application/pdf)]"
        );
    }

    #[test]
    fn test_push_text() {
        let mut content = MessageContent::default();
        content.push_text("Hel");
        content.push_text("lo");
        assert_eq!(content, MessageContent::from("Hello"));
    }
}
