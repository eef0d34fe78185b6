//! # Visitor
//!
//! Every request gets its own [`SessionGate`], restored from the token
//! cookies. Whatever the gate ends up holding after the handler ran is written
//! back:
//!
//! - tokens unchanged: no `Set-Cookie`
//! - refreshed or newly signed in: both cookies replaced
//! - rejected or signed out: both cookies expired
//!
//! Tokens the auth service could not check (it was unreachable) are kept
//! as-is, the visitor is treated as signed out for that one request.
use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::FromRequestParts,
    http::{header::SET_COOKIE, request::Parts},
    response::{IntoResponse, Response},
};
use store::{DashboardApi, PersistedSession, SessionGate, User};

use crate::{
    error::AppError,
    state::State,
    utils::{persisted_session, session_cookies},
};

pub struct Visitor {
    pub gate: SessionGate,
    incoming: Option<PersistedSession>,
    state: Arc<State>,
}

impl FromRequestParts<Arc<State>> for Visitor {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<State>,
    ) -> Result<Self, Self::Rejection> {
        let incoming = persisted_session(&parts.headers);
        let gate = state.backend.session(incoming.clone()).await;

        Ok(Self {
            gate,
            incoming,
            state: state.clone(),
        })
    }
}

impl Visitor {
    pub fn user(&self) -> Option<User> {
        self.gate.current_user()
    }

    /// Dashboard operations scoped to the signed-in operator's token.
    pub fn dashboard(&self) -> Result<DashboardApi, AppError> {
        let token = self.gate.access_token().ok_or(AppError::Unauthorized)?;

        Ok(self.state.backend.dashboard_for(&token))
    }

    /// Attaches cookie updates for any change to the session.
    pub fn finish(self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        let outgoing = self.gate.persisted();

        if outgoing != self.incoming {
            let headers = response.headers_mut();
            for cookie in session_cookies(outgoing.as_ref(), self.state.config.secure_cookies) {
                headers.append(SET_COOKIE, cookie);
            }
        }

        response
    }
}
