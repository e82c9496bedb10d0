pub mod session;
pub mod supabase;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::card::{Card, NewCard};

/// Seconds before expiry at which a session is treated as expired
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Authenticated session returned by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
    pub user: User,
}

impl Session {
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS <= now
    }
}

/// Result of a sign-up. With email confirmation enabled the backend
/// returns only the user; otherwise it signs the user in right away.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    ConfirmationRequired(User),
    SignedIn(Session),
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Invalid login credentials")]
    InvalidCredentials,
    #[error("User already registered")]
    AlreadyRegistered,
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("backend not configured (set supabase_url and supabase_anon_key)")]
    NotConfigured,
}

/// Remote auth + data API
#[async_trait]
pub trait Backend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, BackendError>;
    async fn sign_out(&self, session: &Session) -> Result<(), BackendError>;
    async fn refresh(&self, session: &Session) -> Result<Session, BackendError>;

    async fn insert_card(&self, session: &Session, card: &NewCard) -> Result<Card, BackendError>;
    /// Cards owned by the session's user, newest first
    async fn list_cards(&self, session: &Session) -> Result<Vec<Card>, BackendError>;
    /// Card behind a share id. The signed-in user's token is sent when there is one.
    async fn fetch_shared(&self, session: Option<&Session>, share_id: &str) -> Result<Card, BackendError>;
}
