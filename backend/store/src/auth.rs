//! # Authentication
//!
//! Opaque external identity service. Credentials are only ever checked here;
//! the allow-list in front of it lives in [`crate::session`].
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix seconds, when the service reports it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: User,
}

/// Result of registering an identity. `session` is absent while the service
/// waits for the address to be confirmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub user: User,
    pub session: Option<AuthSession>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Current-session lookup for a persisted access token.
    async fn user(&self, access_token: &str) -> Result<User, AuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;
}
