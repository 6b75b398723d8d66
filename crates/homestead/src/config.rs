use std::env;

pub const BACKEND_URL_VAR: &str = "HOMESTEAD_BACKEND_URL";
pub const BACKEND_ANON_KEY_VAR: &str = "HOMESTEAD_BACKEND_ANON_KEY";

/// Location and public key of the hosted backend (REST tables and auth).
///
/// Either value may be missing. Clients built from an incomplete config construct
/// fine and fail on their first request, so a front end can always start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

impl BackendConfig {
    pub fn new<U: Into<String>, K: Into<String>>(url: U, anon_key: K) -> Self {
        Self {
            url: Some(url.into()),
            anon_key: Some(anon_key.into()),
        }
    }

    /// Read the config from the environment, loading a `.env` file first if present
    pub fn from_env() -> Self {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!("Loaded environment from {:?}", path);
        }
        Self {
            url: env::var(BACKEND_URL_VAR).ok().filter(|v| !v.is_empty()),
            anon_key: env::var(BACKEND_ANON_KEY_VAR).ok().filter(|v| !v.is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() && self.anon_key.is_some()
    }

    /// Base url and key, or the name of the first missing variable
    pub fn credentials(&self) -> Result<(&str, &str), &'static str> {
        let url = self.url.as_deref().ok_or(BACKEND_URL_VAR)?;
        let key = self.anon_key.as_deref().ok_or(BACKEND_ANON_KEY_VAR)?;
        Ok((url.trim_end_matches('/'), key))
    }
}
