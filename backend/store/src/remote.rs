//! # Supabase
//!
//! HTTP client for the hosted backend.
//!
//! ## Records
//! PostgREST under `{url}/rest/v1/{collection}`:
//! - `select=id,email` picks columns
//! - `column=eq.value` filters
//! - `order=created_at.desc` sorts
//! - `Prefer: return=representation` makes writes echo the stored rows
//!
//! ## Auth
//! GoTrue under `{url}/auth/v1`:
//! - `POST token?grant_type=password` and `POST token?grant_type=refresh_token`
//! - `POST signup`, `POST logout`, `GET user`
//!
//! Every request carries the project's public `apikey`. Record calls carry a
//! bearer token as well: the user's access token when one is attached with
//! [`RecordStore::with_access_token`], otherwise the public key itself.
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::{
    auth::{AuthProvider, AuthSession, SignUp, User},
    error::{AuthError, StoreError},
    records::{Filter, RecordStore, Select},
};

const REST_PATH: &str = "rest/v1";
const AUTH_PATH: &str = "auth/v1";

#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl SupabaseClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: None,
        })
    }

    fn rest(&self, method: Method, collection: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);

        self.http
            .request(method, format!("{}/{REST_PATH}/{collection}", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    fn auth(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{AUTH_PATH}/{path}", self.base_url))
            .header("apikey", &self.api_key)
    }
}

/// Query string for a select, in PostgREST syntax.
pub fn select_params(query: &Select) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), compact_columns(query.columns))];
    params.extend(filter_params(&query.filters));

    if let Some(order) = query.order {
        let direction = if order.ascending { "asc" } else { "desc" };
        params.push(("order".to_string(), format!("{}.{direction}", order.column)));
    }

    params
}

pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| {
            let condition = match &filter.value {
                Value::Null => "is.null".to_string(),
                Value::String(s) => format!("eq.{s}"),
                other => format!("eq.{other}"),
            };
            (filter.column.to_string(), condition)
        })
        .collect()
}

fn compact_columns(columns: &str) -> String {
    columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// PostgREST error body.
#[derive(Deserialize, Default)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

async fn rest_rows(response: Response) -> Result<Vec<Value>, StoreError> {
    let response = rest_checked(response).await?;
    let status = response.status();

    if status == StatusCode::NO_CONTENT {
        return Ok(Vec::new());
    }

    let body: Value = response.json().await?;
    match body {
        Value::Array(rows) => Ok(rows),
        other => Err(StoreError::Remote {
            status: status.as_u16(),
            code: String::new(),
            message: format!("Expected a list of rows, got {other}"),
        }),
    }
}

async fn rest_checked(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    let body: RestErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .message
        .or(body.details)
        .unwrap_or_else(|| if text.is_empty() { status.to_string() } else { text });

    Err(StoreError::Remote {
        status: status.as_u16(),
        code: body.code.unwrap_or_default(),
        message,
    })
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn select(&self, collection: &str, query: &Select) -> Result<Vec<Value>, StoreError> {
        debug!("select {collection} {:?}", query.filters);

        let response = self
            .rest(Method::GET, collection)
            .query(&select_params(query))
            .send()
            .await?;

        rest_rows(response).await
    }

    async fn insert(
        &self,
        collection: &str,
        rows: Vec<Value>,
        returning: &str,
    ) -> Result<Vec<Value>, StoreError> {
        debug!("insert {} row(s) into {collection}", rows.len());

        let response = self
            .rest(Method::POST, collection)
            .query(&[("select", compact_columns(returning))])
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;

        rest_rows(response).await
    }

    async fn update(
        &self,
        collection: &str,
        patch: Value,
        filters: &[Filter],
        returning: &str,
    ) -> Result<Vec<Value>, StoreError> {
        debug!("update {collection} {filters:?}");

        let mut params = filter_params(filters);
        params.push(("select".to_string(), compact_columns(returning)));

        let response = self
            .rest(Method::PATCH, collection)
            .query(&params)
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;

        rest_rows(response).await
    }

    async fn delete(&self, collection: &str, filters: &[Filter]) -> Result<(), StoreError> {
        debug!("delete from {collection} {filters:?}");

        let response = self
            .rest(Method::DELETE, collection)
            .query(&filter_params(filters))
            .header("Prefer", "return=minimal")
            .send()
            .await?;

        rest_checked(response).await.map(|_| ())
    }

    fn with_access_token(&self, access_token: &str) -> Arc<dyn RecordStore> {
        Arc::new(Self {
            access_token: Some(access_token.to_string()),
            ..self.clone()
        })
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl From<TokenResponse> for AuthSession {
    fn from(token: TokenResponse) -> Self {
        let expires_at = token.expires_at.or_else(|| {
            token
                .expires_in
                .map(|seconds| chrono::Utc::now().timestamp() + seconds)
        });

        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user,
        }
    }
}

/// GoTrue has shipped several error shapes over time.
#[derive(Deserialize, Default)]
struct AuthErrorBody {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

async fn auth_checked(response: Response) -> Result<Response, AuthError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await?;
    let body: AuthErrorBody = serde_json::from_str(&text).unwrap_or_default();
    let message = body
        .msg
        .or(body.message)
        .or(body.error_description)
        .or(body.error)
        .unwrap_or_else(|| status.to_string());

    Err(AuthError::Rejected {
        status: status.as_u16(),
        message,
    })
}

fn decode_auth<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, AuthError> {
    serde_json::from_value(value).map_err(|e| AuthError::Malformed(e.to_string()))
}

/// A signup answer holds either a full session or just the pending user.
pub fn parse_sign_up(body: Value) -> Result<SignUp, AuthError> {
    if body.get("access_token").is_some() {
        let session: AuthSession = decode_auth::<TokenResponse>(body)?.into();
        return Ok(SignUp {
            user: session.user.clone(),
            session: Some(session),
        });
    }

    let user = match body.get("user") {
        Some(user) => decode_auth(user.clone())?,
        None => decode_auth(body)?,
    };

    Ok(SignUp {
        user,
        session: None,
    })
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        debug!("sign in {email}");

        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&Credentials { email, password })
            .send()
            .await?;

        let body = auth_checked(response).await?.json::<Value>().await?;
        Ok(decode_auth::<TokenResponse>(body)?.into())
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, AuthError> {
        debug!("sign up {email}");

        let response = self
            .auth(Method::POST, "signup")
            .json(&Credentials { email, password })
            .send()
            .await?;

        let body = auth_checked(response).await?.json::<Value>().await?;
        parse_sign_up(body)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .auth(Method::POST, "logout")
            .bearer_auth(access_token)
            .send()
            .await?;

        auth_checked(response).await.map(|_| ())
    }

    async fn user(&self, access_token: &str) -> Result<User, AuthError> {
        let response = self
            .auth(Method::GET, "user")
            .bearer_auth(access_token)
            .send()
            .await?;

        let body = auth_checked(response).await?.json::<Value>().await?;
        decode_auth(body)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        debug!("refresh session");

        let response = self
            .auth(Method::POST, "token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let body = auth_checked(response).await?.json::<Value>().await?;
        Ok(decode_auth::<TokenResponse>(body)?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Order;

    fn pairs(params: &[(String, String)]) -> Vec<(&str, &str)> {
        params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_select_params() {
        let query = Select::columns("id, email, created_at").order(Order::desc("created_at"));

        assert_eq!(
            pairs(&select_params(&query)),
            vec![
                ("select", "id,email,created_at"),
                ("order", "created_at.desc")
            ]
        );
    }

    #[test]
    fn test_filter_params() {
        let filters = [
            Filter::eq("id", 1),
            Filter::eq("email", "jane@x.com"),
            Filter::eq("subject", Value::Null),
        ];

        assert_eq!(
            pairs(&filter_params(&filters)),
            vec![
                ("id", "eq.1"),
                ("email", "eq.jane@x.com"),
                ("subject", "is.null")
            ]
        );
    }

    #[test]
    fn test_sign_up_pending_confirmation() {
        let body = json!({
            "id": "u-1",
            "email": "owner@x.com",
            "confirmation_sent_at": "2025-01-01T00:00:00Z"
        });

        let sign_up = parse_sign_up(body).unwrap();
        assert_eq!(sign_up.user.id, "u-1");
        assert!(sign_up.session.is_none());
    }

    #[test]
    fn test_sign_up_with_session() {
        let body = json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_at": 1_700_000_000,
            "user": { "id": "u-2", "email": "owner@x.com" }
        });

        let sign_up = parse_sign_up(body).unwrap();
        let session = sign_up.session.unwrap();
        assert_eq!(session.access_token, "a");
        assert_eq!(session.expires_at, Some(1_700_000_000));
        assert_eq!(sign_up.user.email.as_deref(), Some("owner@x.com"));
    }
}
