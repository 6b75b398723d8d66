use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::errors::AuthError;

/// An authenticated end user. Every store call is scoped to one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub access_token: String,
}

impl Actor {
    pub fn new<T: Into<String>>(id: Uuid, email: Option<String>, access_token: T) -> Self {
        Self {
            id,
            email,
            access_token: access_token.into(),
        }
    }
}

// The access token never ends up in logs.
impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    access_token: String,
    user: UserRecord,
}

/// Client for the hosted auth API (email one-time codes)
pub struct AuthClient {
    client: Client,
    config: BackendConfig,
}

impl AuthClient {
    pub fn new(config: BackendConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> Result<(String, String), AuthError> {
        let (url, key) = self
            .config
            .credentials()
            .map_err(AuthError::NotConfigured)?;
        Ok((format!("{}/auth/v1/{}", url, path), key.to_string()))
    }

    /// Email a one-time sign-in code, creating the account on first use
    #[instrument(skip(self))]
    pub async fn send_code(&self, email: &str) -> Result<(), AuthError> {
        let (url, key) = self.endpoint("otp")?;
        let response = self
            .client
            .post(url)
            .header("apikey", key)
            .json(&json!({ "email": email, "create_user": true }))
            .send()
            .await?;
        check(response).await?;
        debug!("Sign-in code sent");
        Ok(())
    }

    /// Exchange an emailed code for a session
    #[instrument(skip(self, code))]
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<Actor, AuthError> {
        let (url, key) = self.endpoint("verify")?;
        let response = self
            .client
            .post(url)
            .header("apikey", key)
            .json(&json!({ "type": "email", "email": email, "token": code.trim() }))
            .send()
            .await?;

        let response = match check(response).await {
            Err(AuthError::Api { status, .. }) if status == 400 || status == 403 => {
                return Err(AuthError::InvalidCode)
            }
            other => other?,
        };
        let verified: VerifyResponse = response.json().await?;
        Ok(Actor::new(
            verified.user.id,
            verified.user.email,
            verified.access_token,
        ))
    }

    /// Resolve the actor behind a saved access token, failing if it expired
    #[instrument(skip_all)]
    pub async fn current_user(&self, access_token: &str) -> Result<Actor, AuthError> {
        let (url, key) = self.endpoint("user")?;
        let response = self
            .client
            .get(url)
            .header("apikey", key)
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AuthError::SessionExpired);
        }
        let user: UserRecord = check(response).await?.json().await?;
        Ok(Actor::new(user.id, user.email, access_token))
    }
}

async fn check(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| {
            body.get("msg")
                .or_else(|| body.get("error_description"))
                .or_else(|| body.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| "Unknown error".to_string());
    Err(AuthError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup() -> (MockServer, AuthClient) {
        let server = MockServer::start().await;
        let client = AuthClient::new(BackendConfig::new(server.uri(), "anon-key")).unwrap();
        (server, client)
    }

    #[tokio::test]
    async fn test_verify_code_returns_actor() {
        let (server, client) = setup().await;
        let user_id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .and(header("apikey", "anon-key"))
            .and(body_partial_json(json!({"email": "buyer@example.com", "token": "123456"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-token",
                "token_type": "bearer",
                "user": {"id": user_id, "email": "buyer@example.com"}
            })))
            .mount(&server)
            .await;

        let actor = client
            .verify_code("buyer@example.com", " 123456 ")
            .await
            .unwrap();
        assert_eq!(actor.id, user_id);
        assert_eq!(actor.access_token, "jwt-token");
        assert_eq!(actor.email.as_deref(), Some("buyer@example.com"));
    }

    #[tokio::test]
    async fn test_verify_bad_code() {
        let (server, client) = setup().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/verify"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"msg": "Token has expired"})),
            )
            .mount(&server)
            .await;

        let result = client.verify_code("buyer@example.com", "000000").await;
        assert!(matches!(result, Err(AuthError::InvalidCode)));
    }

    #[tokio::test]
    async fn test_current_user_expired() {
        let (server, client) = setup().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = client.current_user("stale").await;
        assert!(matches!(result, Err(AuthError::SessionExpired)));
    }

    #[tokio::test]
    async fn test_unconfigured_backend_fails_on_first_call() {
        let client = AuthClient::new(BackendConfig::default()).unwrap();
        let result = client.send_code("buyer@example.com").await;
        assert!(matches!(result, Err(AuthError::NotConfigured(_))));
    }

    #[test]
    fn test_debug_redacts_token() {
        let actor = Actor::new(Uuid::new_v4(), None, "secret-token");
        assert!(!format!("{:?}", actor).contains("secret-token"));
    }
}
