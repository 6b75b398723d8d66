pub mod auth;
pub mod chat;
pub mod conversations;
pub mod topics;
pub mod upload;

use anyhow::Result;
use homestead::auth::AuthClient;
use homestead::chat::Orchestrator;
use homestead::client::{HttpCompletion, API_URL_VAR, DEFAULT_API_URL};
use homestead::config::BackendConfig;
use homestead::errors::AuthError;
use homestead::store::RestStore;
use std::sync::Arc;
use tracing::warn;

use crate::session;

/// Where the backend and the chat server live, resolved once per run
pub struct Context {
    pub backend: BackendConfig,
    pub api_url: String,
}

impl Context {
    pub fn new(api_url: Option<String>) -> Self {
        let backend = BackendConfig::from_env();
        let api_url = api_url
            .or_else(|| std::env::var(API_URL_VAR).ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        Self { backend, api_url }
    }

    pub fn auth(&self) -> Result<AuthClient> {
        AuthClient::new(self.backend.clone())
    }

    pub fn orchestrator(&self) -> Result<Arc<Orchestrator>> {
        let store = RestStore::new(self.backend.clone())?;
        let completion = HttpCompletion::new(self.api_url.as_str())?;
        Ok(Arc::new(Orchestrator::new(
            Arc::new(store),
            Arc::new(completion),
        )))
    }

    /// Sign the orchestrator in with the saved session, if it is still valid.
    /// Returns false when nobody is signed in.
    pub async fn restore_session(&self, orchestrator: &Orchestrator) -> Result<bool> {
        let Some(saved) = session::load()? else {
            return Ok(false);
        };
        let actor = match self.auth()?.current_user(&saved.access_token).await {
            Ok(actor) => actor,
            Err(AuthError::SessionExpired) => {
                session::clear()?;
                return Ok(false);
            }
            Err(e) => {
                warn!(error = %e, "Could not validate the saved session");
                saved
            }
        };
        orchestrator.sign_in(actor).await;
        Ok(true)
    }
}
