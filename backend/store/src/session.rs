//! # Session Gate
//!
//! Owns the signed-in state of one visitor. The state only moves through
//! [`SessionGate::apply`]:
//!
//! | Event | New state |
//! |---|---|
//! | `InitialSession` | persisted tokens accepted by the auth service |
//! | `SignedIn` | fresh session from login or sign-up |
//! | `TokenRefreshed` | session rebuilt from the refresh token |
//! | `SignedOut` | nobody |
//!
//! Login is pre-filtered by the `users` allow-list: an email without a row is
//! refused before the auth service ever sees the password.
//!
//! Observers get a [`watch::Receiver`] from [`SessionGate::subscribe`].
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    auth::{AuthProvider, AuthSession, User},
    error::{AuthError, SessionError},
    models::USERS,
    records::{Filter, RecordStore, Select},
};

/// Tokens kept by the client between visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<&AuthSession> for PersistedSession {
    fn from(session: &AuthSession) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    InitialSession(AuthSession),
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignUpOutcome {
    pub needs_email_confirm: bool,
}

pub struct SessionGate {
    auth: Arc<dyn AuthProvider>,
    records: Arc<dyn RecordStore>,
    state: watch::Sender<Option<AuthSession>>,
    /// Tokens that could not be checked because the auth service was down.
    /// They are kept so a later visit can try again.
    unverified: Mutex<Option<PersistedSession>>,
}

impl SessionGate {
    pub fn new(auth: Arc<dyn AuthProvider>, records: Arc<dyn RecordStore>) -> Self {
        let (state, _) = watch::channel(None);

        Self {
            auth,
            records,
            state,
            unverified: Mutex::new(None),
        }
    }

    /// Builds a gate from previously persisted tokens and checks them.
    pub async fn restore(
        auth: Arc<dyn AuthProvider>,
        records: Arc<dyn RecordStore>,
        persisted: Option<PersistedSession>,
    ) -> Self {
        let gate = Self::new(auth, records);
        if let Some(persisted) = persisted {
            gate.resync_from(persisted).await;
        }
        gate
    }

    /// Re-checks the current tokens with the auth service.
    pub async fn resync(&self) {
        if let Some(persisted) = self.persisted() {
            self.resync_from(persisted).await;
        }
    }

    async fn resync_from(&self, persisted: PersistedSession) {
        let user = match self.auth.user(&persisted.access_token).await {
            Ok(user) => user,
            Err(AuthError::Rejected { .. }) => {
                match self.auth.refresh(&persisted.refresh_token).await {
                    Ok(session) => self.apply(SessionEvent::TokenRefreshed(session)),
                    Err(AuthError::Rejected { message, .. }) => {
                        info!("Persisted session rejected: {message}");
                        self.apply(SessionEvent::SignedOut);
                    }
                    Err(e) => self.hold_unverified(persisted, e),
                }
                return;
            }
            Err(e) => return self.hold_unverified(persisted, e),
        };

        self.apply(SessionEvent::InitialSession(AuthSession {
            access_token: persisted.access_token,
            refresh_token: persisted.refresh_token,
            expires_at: None,
            user,
        }));
    }

    fn hold_unverified(&self, persisted: PersistedSession, error: AuthError) {
        warn!("Could not verify persisted session: {error}");

        self.state.send_replace(None);
        *self.unverified_slot() = Some(persisted);
    }

    fn unverified_slot(&self) -> std::sync::MutexGuard<'_, Option<PersistedSession>> {
        self.unverified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply(&self, event: SessionEvent) {
        *self.unverified_slot() = None;

        let next = match event {
            SessionEvent::InitialSession(session)
            | SessionEvent::SignedIn(session)
            | SessionEvent::TokenRefreshed(session) => Some(session),
            SessionEvent::SignedOut => None,
        };
        self.state.send_replace(next);
    }

    async fn is_allowed(&self, email: &str) -> Result<bool, SessionError> {
        let rows = self
            .records
            .select(
                USERS,
                &Select::columns("email").filter(Filter::eq("email", email)),
            )
            .await?;

        Ok(!rows.is_empty())
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        if !self.is_allowed(email).await? {
            info!("Refused login for {email}: not on the allow-list");
            return Err(SessionError::NotAuthorized);
        }

        let session = self.auth.sign_in(email, password).await?;
        self.apply(SessionEvent::SignedIn(session));

        Ok(())
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignUpOutcome, SessionError> {
        let sign_up = self.auth.sign_up(email, password).await?;

        match sign_up.session {
            Some(session) => {
                self.apply(SessionEvent::SignedIn(session));
                Ok(SignUpOutcome {
                    needs_email_confirm: false,
                })
            }
            None => Ok(SignUpOutcome {
                needs_email_confirm: true,
            }),
        }
    }

    /// Always ends signed out. Revoking the tokens upstream is best-effort.
    pub async fn logout(&self) {
        let previous = self.state.send_replace(None);
        *self.unverified_slot() = None;

        if let Some(session) = previous {
            if let Err(e) = self.auth.sign_out(&session.access_token).await {
                warn!("Sign-out was not confirmed by the auth service: {e}");
            }
        }
    }

    pub fn session(&self) -> Option<AuthSession> {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().as_ref().map(|s| s.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.state.borrow().as_ref().map(|s| s.access_token.clone())
    }

    /// Tokens the client should keep, including unverified ones.
    pub fn persisted(&self) -> Option<PersistedSession> {
        self.state
            .borrow()
            .as_ref()
            .map(PersistedSession::from)
            .or_else(|| self.unverified_slot().clone())
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::{
        auth::SignUp,
        memory::{MemoryAuth, MemoryStore},
    };

    async fn setup() -> (SessionGate, MemoryAuth) {
        let store = MemoryStore::default();
        store
            .insert(USERS, vec![json!({ "email": "owner@x.com" })], "email")
            .await
            .unwrap();

        let auth = MemoryAuth::new();
        auth.register("owner@x.com", "secret").await;
        auth.register("stranger@x.com", "secret").await;

        let gate = SessionGate::new(Arc::new(auth.clone()), Arc::new(store));
        (gate, auth)
    }

    #[tokio::test]
    async fn test_login_refused_without_credential_check() {
        let (gate, auth) = setup().await;

        let result = gate.login("stranger@x.com", "secret").await;

        assert!(matches!(result, Err(SessionError::NotAuthorized)));
        assert_eq!(auth.credential_checks(), 0);
        assert!(!gate.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let (gate, auth) = setup().await;
        let mut changes = gate.subscribe();

        gate.login("owner@x.com", "secret").await.unwrap();
        assert!(changes.has_changed().unwrap());
        assert_eq!(
            changes.borrow_and_update().as_ref().map(|s| s.user.email.clone()),
            Some(Some("owner@x.com".to_string()))
        );
        let token = gate.access_token().unwrap();

        gate.logout().await;
        assert!(gate.current_user().is_none());
        assert!(gate.persisted().is_none());
        assert!(auth.user(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_bad_password_reports_service_message() {
        let (gate, _) = setup().await;

        let err = gate.login("owner@x.com", "wrong").await.unwrap_err();

        assert_eq!(err.to_string(), "Invalid login credentials");
        assert!(!gate.is_authenticated());
    }

    #[tokio::test]
    async fn test_restore_and_refresh() {
        let (gate, auth) = setup().await;
        gate.login("owner@x.com", "secret").await.unwrap();
        let persisted = gate.persisted().unwrap();

        let restored = SessionGate::restore(
            Arc::new(auth.clone()),
            Arc::new(MemoryStore::default()),
            Some(persisted.clone()),
        )
        .await;
        assert_eq!(restored.persisted(), Some(persisted.clone()));

        auth.expire(&persisted.access_token).await;
        restored.resync().await;
        let refreshed = restored.persisted().unwrap();
        assert_ne!(refreshed.access_token, persisted.access_token);
        assert!(restored.is_authenticated());

        auth.revoke("owner@x.com").await;
        restored.resync().await;
        assert!(!restored.is_authenticated());
        assert!(restored.persisted().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_needing_confirmation() {
        let auth = MemoryAuth::requiring_email_confirm();
        let gate = SessionGate::new(Arc::new(auth), Arc::new(MemoryStore::default()));

        let outcome = gate.sign_up("new@x.com", "pw").await.unwrap();

        assert!(outcome.needs_email_confirm);
        assert!(!gate.is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_up_with_session() {
        let gate = SessionGate::new(
            Arc::new(MemoryAuth::new()),
            Arc::new(MemoryStore::default()),
        );

        let outcome = gate.sign_up("new@x.com", "pw").await.unwrap();

        assert!(!outcome.needs_email_confirm);
        assert_eq!(
            gate.current_user().and_then(|u| u.email),
            Some("new@x.com".to_string())
        );
    }

    struct Unreachable;

    #[async_trait]
    impl AuthProvider for Unreachable {
        async fn sign_in(&self, _: &str, _: &str) -> Result<AuthSession, AuthError> {
            Err(AuthError::Malformed("offline".to_string()))
        }

        async fn sign_up(&self, _: &str, _: &str) -> Result<SignUp, AuthError> {
            Err(AuthError::Malformed("offline".to_string()))
        }

        async fn sign_out(&self, _: &str) -> Result<(), AuthError> {
            Err(AuthError::Malformed("offline".to_string()))
        }

        async fn user(&self, _: &str) -> Result<User, AuthError> {
            Err(AuthError::Malformed("offline".to_string()))
        }

        async fn refresh(&self, _: &str) -> Result<AuthSession, AuthError> {
            Err(AuthError::Malformed("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unverifiable_session_is_kept_but_not_trusted() {
        let persisted = PersistedSession {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
        };

        let gate = SessionGate::restore(
            Arc::new(Unreachable),
            Arc::new(MemoryStore::default()),
            Some(persisted.clone()),
        )
        .await;

        assert!(!gate.is_authenticated());
        assert_eq!(gate.persisted(), Some(persisted));

        gate.logout().await;
        assert!(gate.persisted().is_none());
    }
}
