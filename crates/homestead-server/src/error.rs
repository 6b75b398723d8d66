//! Errors a handler can return.
//!
//! Client mistakes are answered with their message. Upstream failures are
//! logged in full and answered with a fixed message.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use homestead::errors::{RequestError, UploadError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

pub const GENERATION_FAILED: &str = "Failed to generate response";
pub const UPLOAD_FAILED: &str = "Failed to process files";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The model provider failed before anything was sent back
    #[error("generation failed: {0}")]
    Generation(anyhow::Error),

    #[error("upload failed: {0}")]
    Upload(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::BadRequest(message) => (StatusCode::BAD_REQUEST, message.clone()),
            ServerError::Generation(e) => {
                error!(error = ?e, "Error in chat API");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERATION_FAILED.to_string())
            }
            ServerError::Upload(message) => {
                error!(message = %message, "Error processing files");
                (StatusCode::INTERNAL_SERVER_ERROR, UPLOAD_FAILED.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<RequestError> for ServerError {
    fn from(e: RequestError) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl From<UploadError> for ServerError {
    fn from(e: UploadError) -> Self {
        match e {
            UploadError::UnknownDocumentType(_) => ServerError::BadRequest(e.to_string()),
            other => ServerError::Upload(other.to_string()),
        }
    }
}

/// Errors loading the server settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),

    #[error("Invalid server address {0}")]
    Address(String),
}
