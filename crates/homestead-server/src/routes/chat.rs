use crate::error::{ServerError, GENERATION_FAILED};
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use futures::{stream::StreamExt, Stream};
use homestead::assembler::{ChatRequest, RawChatRequest};
use homestead::completion::Reply;
use homestead::errors::RequestError;
use homestead::protocol::{done_frame, StreamEvent, TextStream};
use serde_json::json;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

/// Event stream body: `data: {"text": ...}` frames closed by `data: [DONE]`
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = Body::from_stream(self);
        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

fn parse_request(body: &[u8]) -> Result<ChatRequest, ServerError> {
    let raw: RawChatRequest = serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected chat body: {}", e);
        RequestError::InvalidFormat
    })?;
    Ok(ChatRequest::try_from(raw)?)
}

/// Forward deltas as frames. A failure after the first byte cannot change the
/// status any more, so it becomes an error frame.
fn stream_reply(reply: Reply) -> SseResponse {
    let (tx, rx) = mpsc::channel(100);
    let mut deltas: TextStream = match reply {
        Reply::Stream(stream) => stream,
        Reply::Text(text) => Box::pin(futures::stream::once(async move {
            Ok::<_, anyhow::Error>(text)
        })),
    };

    tokio::spawn(async move {
        while let Some(delta) = deltas.next().await {
            let frame = match delta {
                Ok(text) if text.is_empty() => continue,
                Ok(text) => StreamEvent::text(text).to_frame(),
                Err(e) => {
                    error!(error = ?e, "Error streaming response");
                    let _ = tx.send(StreamEvent::error(GENERATION_FAILED).to_frame()).await;
                    break;
                }
            };
            if tx.send(frame).await.is_err() {
                debug!("Client went away mid stream");
                return;
            }
        }
        let _ = tx.send(done_frame()).await;
    });

    SseResponse::new(ReceiverStream::new(rx))
}

async fn handler(State(state): State<AppState>, body: Bytes) -> Result<Response, ServerError> {
    let request = parse_request(&body)?;
    let streaming = request.is_streaming();
    info!(streaming, "Chat request");

    let reply = state
        .completion
        .respond(request)
        .await
        .map_err(ServerError::Generation)?;

    if streaming {
        return Ok(stream_reply(reply).into_response());
    }
    let text = reply.collect().await.map_err(ServerError::Generation)?;
    Ok(Json(json!({ "text": text })).into_response())
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handler))
        .with_state(state)
}
