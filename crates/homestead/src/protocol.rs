//! The line oriented event stream spoken by `/api/chat` and by the model providers.
//!
//! Each event is a `data: <payload>` line followed by a blank line. A `[DONE]`
//! payload ends the stream.
use anyhow::Result;
use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// A text stream as produced by a provider or the chat endpoint
pub type TextStream = BoxStream<'static, Result<String>>;

/// Payload of one chat endpoint event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Text { text: String },
    Error { error: String },
}

impl StreamEvent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        StreamEvent::Text { text: text.into() }
    }

    pub fn error<S: Into<String>>(error: S) -> Self {
        StreamEvent::Error {
            error: error.into(),
        }
    }

    /// Render as a complete event, terminator included
    pub fn to_frame(&self) -> String {
        let encoded = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("{} {}\n\n", DATA_PREFIX, encoded)
    }
}

pub fn done_frame() -> String {
    format!("{} {}\n\n", DATA_PREFIX, DONE_SENTINEL)
}

#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
    /// Blank lines, comments and fields other than `data`
    Ignored,
}

pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim_end_matches(['\r', '\n']);
    match line.strip_prefix(DATA_PREFIX) {
        Some(data) => {
            let data = data.strip_prefix(' ').unwrap_or(data);
            if data.trim() == DONE_SENTINEL {
                SseLine::Done
            } else {
                SseLine::Data(data)
            }
        }
        None => SseLine::Ignored,
    }
}

/// Split a byte stream into `data` payloads, stopping at `[DONE]` or end of body.
///
/// Chunks may split lines (and multi-byte characters) anywhere, so bytes are
/// buffered until a full line is available.
pub fn sse_data<S>(body: S) -> TextStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut body = Box::pin(body);
        let mut buffer: Vec<u8> = Vec::new();
        let mut finished = false;

        'read: while let Some(chunk) = body.next().await {
            buffer.extend_from_slice(&chunk?);
            while let Some(end) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=end).collect();
                let line = String::from_utf8_lossy(&line);
                match parse_sse_line(&line) {
                    SseLine::Data(data) => yield data.to_string(),
                    SseLine::Done => {
                        finished = true;
                        break 'read;
                    }
                    SseLine::Ignored => {}
                }
            }
        }

        if !finished && !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).to_string();
            if let SseLine::Data(data) = parse_sse_line(&line) {
                yield data.to_string();
            }
        }
    })
}

/// Decode chat endpoint events into text deltas. An error event fails the stream.
pub fn chat_events(data: TextStream) -> TextStream {
    Box::pin(async_stream::try_stream! {
        let mut data = data;
        while let Some(payload) = data.next().await {
            let payload = payload?;
            match serde_json::from_str::<StreamEvent>(&payload) {
                Ok(StreamEvent::Text { text }) => yield text,
                Ok(StreamEvent::Error { error }) => {
                    Err::<(), _>(anyhow::anyhow!("Stream failed: {}", error))?;
                }
                Err(e) => tracing::debug!("Skipping undecodable event {:?}: {}", payload, e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use futures::TryStreamExt;

    fn chunks(parts: Vec<&'static str>) -> impl Stream<Item = reqwest::Result<Bytes>> {
        stream::iter(
            parts
                .into_iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes()))),
        )
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(parse_sse_line("data: {\"text\":\"hi\"}"), SseLine::Data("{\"text\":\"hi\"}"));
        assert_eq!(parse_sse_line("data:{}"), SseLine::Data("{}"));
        assert_eq!(parse_sse_line("data: [DONE]\r\n"), SseLine::Done);
        assert_eq!(parse_sse_line(""), SseLine::Ignored);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Ignored);
        assert_eq!(parse_sse_line("event: message"), SseLine::Ignored);
    }

    #[test]
    fn test_frames() {
        assert_eq!(
            StreamEvent::text("Hello \"world\"").to_frame(),
            "data: {\"text\":\"Hello \\\"world\\\"\"}\n\n"
        );
        assert_eq!(done_frame(), "data: [DONE]\n\n");
        assert_eq!(
            StreamEvent::error("boom").to_frame(),
            "data: {\"error\":\"boom\"}\n\n"
        );
    }

    #[tokio::test]
    async fn test_sse_data_handles_split_chunks() {
        let body = chunks(vec![
            "data: {\"text\":\"Hel",
            "lo\"}\n\ndata: {\"text\":\" th",
            "ere\"}\n\n",
            "data: [DONE]\n\n",
            "data: {\"text\":\"after done\"}\n\n",
        ]);
        let payloads: Vec<String> = sse_data(body).try_collect().await.unwrap();
        assert_eq!(
            payloads,
            vec!["{\"text\":\"Hello\"}", "{\"text\":\" there\"}"]
        );
    }

    #[tokio::test]
    async fn test_sse_data_split_multibyte_character() {
        let text = "data: {\"text\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let (head, tail) = text.split_at(split);
        let body = stream::iter(vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ]);
        let deltas: Vec<String> = chat_events(sse_data(body)).try_collect().await.unwrap();
        assert_eq!(deltas, vec!["caf\u{e9}"]);
    }

    #[tokio::test]
    async fn test_chat_events_error_fails_stream() {
        let body = chunks(vec![
            "data: {\"text\":\"partial\"}\n\n",
            "data: {\"error\":\"upstream closed\"}\n\n",
            "data: [DONE]\n\n",
        ]);
        let mut events = chat_events(sse_data(body));
        assert_eq!(events.next().await.unwrap().unwrap(), "partial");
        let error = events.next().await.unwrap().unwrap_err();
        assert!(error.to_string().contains("upstream closed"));
    }

    #[tokio::test]
    async fn test_trailing_line_without_newline() {
        let body = chunks(vec!["data: {\"text\":\"tail\"}"]);
        let deltas: Vec<String> = chat_events(sse_data(body)).try_collect().await.unwrap();
        assert_eq!(deltas, vec!["tail"]);
    }
}
