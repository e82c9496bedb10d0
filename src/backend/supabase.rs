//! Supabase implementation of [`Backend`]: GoTrue for auth, PostgREST for rows

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{Backend, BackendError, Session, SignUpOutcome, User};
use crate::card::{Card, NewCard};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

pub struct SupabaseBackend {
    base_url: String,
    anon_key: String,
    client: Client,
}

/// Token grant response from `/auth/v1/token`
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self.expires_at.unwrap_or_else(|| {
            chrono::Utc::now().timestamp() + self.expires_in.unwrap_or(3600)
        });
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

impl SupabaseBackend {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self, BackendError> {
        if base_url.trim().is_empty() || anon_key.trim().is_empty() {
            return Err(BackendError::NotConfigured);
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            anon_key: anon_key.trim().to_string(),
            client,
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Attach the project key, plus the user's token when there is one
    fn authed(&self, req: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
        let token = session.map(|s| s.access_token.as_str()).unwrap_or(self.anon_key.as_str());
        req.header("apikey", &self.anon_key).bearer_auth(token)
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> Result<Session, BackendError> {
        let req = self
            .client
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .json(&body);
        let resp = check(self.authed(req, None).send().await?).await?;
        let token: TokenResponse = decode(resp).await?;
        Ok(token.into_session())
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        tracing::debug!("Signing in {}", email);
        self.token_grant("password", json!({ "email": email, "password": password })).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError> {
        tracing::debug!("Signing up {}", email);
        let req = self
            .client
            .post(self.auth_url("signup"))
            .json(&json!({ "email": email, "password": password }));
        let resp = check(self.authed(req, None).send().await?).await?;
        let body: serde_json::Value = decode(resp).await?;
        parse_sign_up(body)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), BackendError> {
        let req = self.client.post(self.auth_url("logout"));
        check(self.authed(req, Some(session)).send().await?).await?;
        Ok(())
    }

    async fn refresh(&self, session: &Session) -> Result<Session, BackendError> {
        tracing::debug!("Refreshing session for {}", session.user.id);
        self.token_grant("refresh_token", json!({ "refresh_token": session.refresh_token })).await
    }

    async fn insert_card(&self, session: &Session, card: &NewCard) -> Result<Card, BackendError> {
        let req = self
            .client
            .post(self.rest_url("cards"))
            .header("Prefer", "return=representation")
            .header("Accept", SINGLE_OBJECT)
            .json(card);
        let resp = check(self.authed(req, Some(session)).send().await?).await?;
        decode(resp).await
    }

    async fn list_cards(&self, session: &Session) -> Result<Vec<Card>, BackendError> {
        let owner = format!("eq.{}", session.user.id);
        let req = self.client.get(self.rest_url("cards")).query(&[
            ("select", "*"),
            ("user_id", owner.as_str()),
            ("order", "created_at.desc"),
        ]);
        let resp = check(self.authed(req, Some(session)).send().await?).await?;
        decode(resp).await
    }

    async fn fetch_shared(&self, session: Option<&Session>, share_id: &str) -> Result<Card, BackendError> {
        let filter = format!("eq.{}", share_id);
        let req = self
            .client
            .get(self.rest_url("cards"))
            .header("Accept", SINGLE_OBJECT)
            .query(&[("select", "*"), ("share_id", filter.as_str())]);
        let resp = check(self.authed(req, session).send().await?).await?;
        decode(resp).await
    }
}

/// Turn a non-2xx response into a [`BackendError`]
async fn check(resp: Response) -> Result<Response, BackendError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T, BackendError> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| BackendError::Decode(e.to_string()))
}

/// Map an error body from either GoTrue or PostgREST
fn api_error(status: u16, body: &str) -> BackendError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| format!("HTTP {}", status));

    if message == "Invalid login credentials" {
        BackendError::InvalidCredentials
    } else if message.contains("already registered") {
        BackendError::AlreadyRegistered
    } else {
        BackendError::Api { status, message }
    }
}

fn parse_sign_up(body: serde_json::Value) -> Result<SignUpOutcome, BackendError> {
    if body.get("access_token").is_some() {
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|e| BackendError::Decode(e.to_string()))?;
        return Ok(SignUpOutcome::SignedIn(token.into_session()));
    }

    // Confirmation pending: the user is either nested or the body itself
    let user = body.get("user").cloned().unwrap_or(body);
    let user: User = serde_json::from_value(user).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(SignUpOutcome::ConfirmationRequired(user))
}
