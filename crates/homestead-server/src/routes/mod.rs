pub mod chat;
pub mod health;
pub mod upload;

use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use homestead::upload::MAX_UPLOAD_BYTES;

/// Room for several maximum size files, base64 encoded in a chat body or raw in a form
pub const MAX_BODY_BYTES: usize = 8 * MAX_UPLOAD_BYTES as usize;

pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(chat::routes(state.clone()))
        .merge(upload::routes(state))
        .merge(health::routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
