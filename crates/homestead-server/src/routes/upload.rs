use crate::error::ServerError;
use crate::state::AppState;
use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use homestead::upload::{
    guess_mime_type, is_allowed_type, DocumentType, UploadResponse, UploadedFile,
    MAX_UPLOAD_BYTES, UPLOAD_SUCCESS_MESSAGE,
};
use tracing::{debug, info, warn};

const NO_FILES: &str = "No files provided";

async fn handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let mut received = Vec::new();
    let mut document_type = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "files" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field
                    .content_type()
                    .map(String::from)
                    .unwrap_or_else(|| guess_mime_type(&name));
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read {name}: {e}")))?;
                received.push((name, mime_type, data.to_vec()));
            }
            "documentType" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {e}")))?;
                document_type = Some(DocumentType::parse(&value)?);
            }
            other => debug!(field = other, "Ignoring form field"),
        }
    }

    let document_type = document_type.unwrap_or(DocumentType::Other);
    let files: Vec<UploadedFile> = received
        .into_iter()
        .filter(|(name, mime_type, data)| {
            let keep = is_allowed_type(mime_type) && data.len() as u64 <= MAX_UPLOAD_BYTES;
            if !keep {
                warn!(file = %name, mime_type = %mime_type, size = data.len(), "Skipping file");
            }
            keep
        })
        .map(|(name, mime_type, data)| {
            UploadedFile::process(&state.extractors, name, mime_type, data, document_type)
        })
        .collect();

    if files.is_empty() {
        return Err(ServerError::BadRequest(NO_FILES.to_string()));
    }
    info!(count = files.len(), document_type = %document_type, "Processed upload");

    Ok(Json(UploadResponse {
        files,
        message: UPLOAD_SUCCESS_MESSAGE.to_string(),
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/upload", post(handler))
        .with_state(state)
}
