//! # In-memory backend
//!
//! Process-local stand-ins for the hosted record store and auth service. Used
//! by tests and by the server's `memory` backend mode.
//!
//! The record store mimics the server-side behaviour the site relies on:
//! - generated `id` (UUID text or serial integer, per collection)
//! - `created_at` stamped on insert, strictly increasing
//! - `updated_at` stamped on insert and on every update
//! - unknown collections and columns fail with PostgREST's error codes
use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering as AtomicOrdering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    auth::{AuthProvider, AuthSession, SignUp, User},
    error::{AuthError, StoreError},
    models::{CONTACT_SETTINGS, MESSAGES, RESTAURANTS, SUBSCRIPTIONS, USERS},
    records::{Filter, RecordStore, Select, column_list},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Text UUID generated when absent.
    Uuid,
    /// Integer generated from a per-collection sequence when absent.
    Serial,
    /// Caller-provided natural key.
    Natural(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct CollectionSchema {
    pub name: &'static str,
    pub key: KeyKind,
    pub columns: &'static [&'static str],
}

impl CollectionSchema {
    fn key_column(&self) -> &'static str {
        match self.key {
            KeyKind::Natural(column) => column,
            KeyKind::Uuid | KeyKind::Serial => "id",
        }
    }

    fn has(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }
}

pub const SITE_SCHEMA: &[CollectionSchema] = &[
    CollectionSchema {
        name: SUBSCRIPTIONS,
        key: KeyKind::Uuid,
        columns: &["id", "email", "created_at"],
    },
    CollectionSchema {
        name: MESSAGES,
        key: KeyKind::Uuid,
        columns: &["id", "name", "email", "subject", "message", "created_at"],
    },
    CollectionSchema {
        name: CONTACT_SETTINGS,
        key: KeyKind::Serial,
        columns: &["id", "phone", "email", "address", "updated_at"],
    },
    CollectionSchema {
        name: RESTAURANTS,
        key: KeyKind::Uuid,
        columns: &[
            "id",
            "name",
            "address",
            "description",
            "created_at",
            "updated_at",
        ],
    },
    CollectionSchema {
        name: USERS,
        key: KeyKind::Natural("email"),
        columns: &["email"],
    },
];

struct Collection {
    schema: CollectionSchema,
    rows: Vec<Map<String, Value>>,
    next_serial: i64,
}

struct Tables {
    collections: HashMap<&'static str, Collection>,
    last_stamp: DateTime<Utc>,
}

impl Tables {
    fn stamp(&mut self) -> String {
        let mut now = Utc::now();
        if now <= self.last_stamp {
            now = self.last_stamp + Duration::microseconds(1);
        }
        self.last_stamp = now;

        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn collection(&mut self, name: &str) -> Result<&mut Collection, StoreError> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| StoreError::Remote {
                status: 404,
                code: "42P01".to_string(),
                message: format!("relation \"public.{name}\" does not exist"),
            })
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_schema(SITE_SCHEMA)
    }
}

impl MemoryStore {
    pub fn with_schema(schema: &[CollectionSchema]) -> Self {
        let collections = schema
            .iter()
            .map(|schema| {
                (
                    schema.name,
                    Collection {
                        schema: *schema,
                        rows: Vec::new(),
                        next_serial: 1,
                    },
                )
            })
            .collect();

        Self {
            tables: Arc::new(Mutex::new(Tables {
                collections,
                last_stamp: DateTime::<Utc>::MIN_UTC,
            })),
        }
    }

    /// Row count of a collection, zero when it does not exist.
    pub async fn len(&self, collection: &str) -> usize {
        self.tables
            .lock()
            .await
            .collections
            .get(collection)
            .map_or(0, |c| c.rows.len())
    }
}

fn missing_column(collection: &str, column: &str) -> StoreError {
    StoreError::Remote {
        status: 400,
        code: "42703".to_string(),
        message: format!("column {collection}.{column} does not exist"),
    }
}

fn check_columns<'a>(
    schema: &CollectionSchema,
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<(), StoreError> {
    for column in columns {
        if !schema.has(column) {
            return Err(missing_column(schema.name, column));
        }
    }
    Ok(())
}

fn matches(row: &Map<String, Value>, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| row.get(f.column).unwrap_or(&Value::Null) == &f.value)
}

/// Nulls sort last, like Postgres in ascending order.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn project(
    schema: &CollectionSchema,
    row: &Map<String, Value>,
    columns: &str,
) -> Result<Value, StoreError> {
    let Some(columns) = column_list(columns) else {
        return Ok(Value::Object(row.clone()));
    };
    check_columns(schema, columns.iter().copied())?;

    Ok(Value::Object(
        columns
            .into_iter()
            .map(|c| (c.to_string(), row.get(c).cloned().unwrap_or(Value::Null)))
            .collect(),
    ))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(&self, collection: &str, query: &Select) -> Result<Vec<Value>, StoreError> {
        let mut tables = self.tables.lock().await;
        let collection = tables.collection(collection)?;
        let schema = collection.schema;

        check_columns(&schema, query.filters.iter().map(|f| f.column))?;

        let mut rows: Vec<&Map<String, Value>> = collection
            .rows
            .iter()
            .filter(|row| matches(row, &query.filters))
            .collect();

        if let Some(order) = query.order {
            check_columns(&schema, [order.column])?;
            // stable sort keeps insertion order for ties
            rows.sort_by(|a, b| {
                let ordering = compare(
                    a.get(order.column).unwrap_or(&Value::Null),
                    b.get(order.column).unwrap_or(&Value::Null),
                );
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        rows.into_iter()
            .map(|row| project(&schema, row, query.columns))
            .collect()
    }

    async fn insert(
        &self,
        collection: &str,
        rows: Vec<Value>,
        returning: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let mut tables = self.tables.lock().await;
        let schema = tables.collection(collection)?.schema;

        let mut prepared = Vec::with_capacity(rows.len());
        for row in rows {
            let Value::Object(mut row) = row else {
                return Err(StoreError::Remote {
                    status: 400,
                    code: "PGRST102".to_string(),
                    message: "All object keys must match".to_string(),
                });
            };
            check_columns(&schema, row.keys().map(String::as_str))?;

            if schema.has("created_at") && !row.contains_key("created_at") {
                row.insert("created_at".to_string(), Value::String(tables.stamp()));
            }
            if schema.has("updated_at") {
                row.insert("updated_at".to_string(), Value::String(tables.stamp()));
            }
            prepared.push(row);
        }

        // Validate the whole batch before storing any of it.
        let target = tables.collection(collection)?;
        let mut next_serial = target.next_serial;
        let key_column = schema.key_column();
        for row in &mut prepared {
            match schema.key {
                KeyKind::Uuid if !row.contains_key("id") => {
                    row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
                }
                KeyKind::Serial => match row.get("id").and_then(Value::as_i64) {
                    Some(id) => next_serial = next_serial.max(id.saturating_add(1)),
                    None => {
                        row.insert("id".to_string(), Value::from(next_serial));
                        next_serial = next_serial.saturating_add(1);
                    }
                },
                _ => {}
            }

            for column in schema.columns {
                row.entry(column.to_string()).or_insert(Value::Null);
            }
        }

        for (index, row) in prepared.iter().enumerate() {
            let key = row.get(key_column).unwrap_or(&Value::Null);
            let clash = target
                .rows
                .iter()
                .chain(prepared[..index].iter())
                .any(|existing| existing.get(key_column) == Some(key));
            if clash {
                return Err(StoreError::Remote {
                    status: 409,
                    code: "23505".to_string(),
                    message: format!(
                        "duplicate key value violates unique constraint \"{}_pkey\"",
                        schema.name
                    ),
                });
            }
        }

        let returned = prepared
            .iter()
            .map(|row| project(&schema, row, returning))
            .collect::<Result<Vec<_>, _>>()?;

        target.next_serial = next_serial;
        target.rows.extend(prepared);

        Ok(returned)
    }

    async fn update(
        &self,
        collection: &str,
        patch: Value,
        filters: &[Filter],
        returning: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let mut tables = self.tables.lock().await;
        let schema = tables.collection(collection)?.schema;

        let Value::Object(mut patch) = patch else {
            return Err(StoreError::Remote {
                status: 400,
                code: "PGRST102".to_string(),
                message: "Empty or invalid json".to_string(),
            });
        };
        check_columns(&schema, patch.keys().map(String::as_str))?;
        check_columns(&schema, filters.iter().map(|f| f.column))?;

        if schema.has("updated_at") {
            patch.insert("updated_at".to_string(), Value::String(tables.stamp()));
        }

        let target = tables.collection(collection)?;
        let mut updated = Vec::new();
        for row in target.rows.iter_mut().filter(|row| matches(row, filters)) {
            for (column, value) in &patch {
                row.insert(column.clone(), value.clone());
            }
            updated.push(project(&schema, row, returning)?);
        }

        Ok(updated)
    }

    async fn delete(&self, collection: &str, filters: &[Filter]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        let target = tables.collection(collection)?;
        check_columns(&target.schema, filters.iter().map(|f| f.column))?;

        target.rows.retain(|row| !matches(row, filters));

        Ok(())
    }

    fn with_access_token(&self, _access_token: &str) -> Arc<dyn RecordStore> {
        Arc::new(self.clone())
    }
}

struct Account {
    id: String,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    access_tokens: HashMap<String, String>,
    refresh_tokens: HashMap<String, String>,
}

const SESSION_SECONDS: i64 = 3600;

impl Accounts {
    fn issue(&mut self, email: &str) -> Result<AuthSession, AuthError> {
        let account = self
            .by_email
            .get(email)
            .ok_or_else(|| AuthError::Malformed(format!("no account for {email}")))?;
        let user = User {
            id: account.id.clone(),
            email: Some(email.to_string()),
        };

        let access_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        self.access_tokens
            .insert(access_token.clone(), email.to_string());
        self.refresh_tokens
            .insert(refresh_token.clone(), email.to_string());

        Ok(AuthSession {
            access_token,
            refresh_token,
            expires_at: Some(Utc::now().timestamp() + SESSION_SECONDS),
            user,
        })
    }
}

/// Password accounts kept in memory. Passwords are stored as given, so this is
/// only fit for tests and local development.
#[derive(Clone, Default)]
pub struct MemoryAuth {
    accounts: Arc<Mutex<Accounts>>,
    require_email_confirm: bool,
    credential_checks: Arc<AtomicU64>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// New sign-ups stay unconfirmed and get no session until [`Self::confirm`].
    pub fn requiring_email_confirm() -> Self {
        Self {
            require_email_confirm: true,
            ..Self::default()
        }
    }

    /// Registers a confirmed account directly.
    pub async fn register(&self, email: &str, password: &str) {
        self.accounts.lock().await.by_email.insert(
            email.to_string(),
            Account {
                id: Uuid::new_v4().to_string(),
                password: password.to_string(),
                confirmed: true,
            },
        );
    }

    pub async fn confirm(&self, email: &str) {
        if let Some(account) = self.accounts.lock().await.by_email.get_mut(email) {
            account.confirmed = true;
        }
    }

    /// Invalidates an access token while leaving its refresh token usable.
    pub async fn expire(&self, access_token: &str) {
        self.accounts.lock().await.access_tokens.remove(access_token);
    }

    /// Drops every token of an account, as an external sign-out would.
    pub async fn revoke(&self, email: &str) {
        let mut accounts = self.accounts.lock().await;
        accounts.access_tokens.retain(|_, owner| owner.as_str() != email);
        accounts.refresh_tokens.retain(|_, owner| owner.as_str() != email);
    }

    /// Number of password checks performed so far.
    pub fn credential_checks(&self) -> u64 {
        self.credential_checks.load(AtomicOrdering::SeqCst)
    }
}

fn rejected(status: u16, message: &str) -> AuthError {
    AuthError::Rejected {
        status,
        message: message.to_string(),
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.credential_checks.fetch_add(1, AtomicOrdering::SeqCst);

        let mut accounts = self.accounts.lock().await;
        match accounts.by_email.get(email) {
            Some(account) if account.password == password => {
                if !account.confirmed {
                    return Err(rejected(400, "Email not confirmed"));
                }
            }
            _ => return Err(rejected(400, "Invalid login credentials")),
        }

        accounts.issue(email)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, AuthError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.by_email.contains_key(email) {
            return Err(rejected(422, "User already registered"));
        }

        let id = Uuid::new_v4().to_string();
        accounts.by_email.insert(
            email.to_string(),
            Account {
                id: id.clone(),
                password: password.to_string(),
                confirmed: !self.require_email_confirm,
            },
        );

        let user = User {
            id,
            email: Some(email.to_string()),
        };
        if self.require_email_confirm {
            return Ok(SignUp {
                user,
                session: None,
            });
        }

        let session = accounts.issue(email)?;
        Ok(SignUp {
            user,
            session: Some(session),
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let mut accounts = self.accounts.lock().await;
        let email = accounts
            .access_tokens
            .remove(access_token)
            .ok_or_else(|| rejected(401, "invalid JWT"))?;
        accounts.refresh_tokens.retain(|_, owner| *owner != email);

        Ok(())
    }

    async fn user(&self, access_token: &str) -> Result<User, AuthError> {
        let accounts = self.accounts.lock().await;
        let email = accounts
            .access_tokens
            .get(access_token)
            .ok_or_else(|| rejected(401, "invalid JWT"))?;
        let account = accounts
            .by_email
            .get(email)
            .ok_or_else(|| rejected(401, "User not found"))?;

        Ok(User {
            id: account.id.clone(),
            email: Some(email.clone()),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let mut accounts = self.accounts.lock().await;
        let email = accounts
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| rejected(400, "Invalid Refresh Token: Refresh Token Not Found"))?;
        accounts.access_tokens.retain(|_, owner| *owner != email);

        accounts.issue(&email)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::records::Order;

    #[tokio::test]
    async fn test_insert_fills_server_defaults() {
        let store = MemoryStore::default();
        let rows = store
            .insert(
                MESSAGES,
                vec![json!({ "name": "Jane", "email": "jane@x.com", "message": "Hi" })],
                "*",
            )
            .await
            .unwrap();

        let row = &rows[0];
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());
        assert_eq!(row["subject"], Value::Null);
    }

    #[tokio::test]
    async fn test_serial_keys_and_duplicates() {
        let store = MemoryStore::default();
        store
            .insert(CONTACT_SETTINGS, vec![json!({ "id": 1, "phone": "1" })], "id")
            .await
            .unwrap();

        let duplicate = store
            .insert(CONTACT_SETTINGS, vec![json!({ "id": 1 })], "id")
            .await;
        assert!(matches!(duplicate, Err(StoreError::Remote { status: 409, .. })));

        let next = store
            .insert(CONTACT_SETTINGS, vec![json!({ "phone": "2" })], "id")
            .await
            .unwrap();
        assert_eq!(next[0]["id"], json!(2));
        assert_eq!(store.len(CONTACT_SETTINGS).await, 2);
    }

    #[tokio::test]
    async fn test_serial_key_at_upper_bound() {
        let store = MemoryStore::default();
        let rows = store
            .insert(CONTACT_SETTINGS, vec![json!({ "id": i64::MAX })], "id")
            .await
            .unwrap();
        assert_eq!(rows[0]["id"], json!(i64::MAX));

        let exhausted = store
            .insert(CONTACT_SETTINGS, vec![json!({ "phone": "2" })], "id")
            .await;
        assert!(matches!(exhausted, Err(StoreError::Remote { status: 409, .. })));
        assert_eq!(store.len(CONTACT_SETTINGS).await, 1);
    }

    #[tokio::test]
    async fn test_select_orders_and_projects() {
        let store = MemoryStore::default();
        for email in ["a@x.com", "b@x.com", "c@x.com"] {
            store
                .insert(SUBSCRIPTIONS, vec![json!({ "email": email })], "id")
                .await
                .unwrap();
        }

        let rows = store
            .select(
                SUBSCRIPTIONS,
                &Select::columns("email").order(Order::desc("created_at")),
            )
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                json!({ "email": "c@x.com" }),
                json!({ "email": "b@x.com" }),
                json!({ "email": "a@x.com" })
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_collection_and_column() {
        let store = MemoryStore::default();

        let missing = store.select("menus", &Select::columns("*")).await;
        assert!(matches!(
            missing,
            Err(StoreError::Remote { ref code, .. }) if code == "42P01"
        ));

        let bad_column = store
            .insert(SUBSCRIPTIONS, vec![json!({ "mail": "a@x.com" })], "*")
            .await;
        assert!(matches!(
            bad_column,
            Err(StoreError::Remote { ref code, .. }) if code == "42703"
        ));
        assert_eq!(store.len(SUBSCRIPTIONS).await, 0);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryStore::default();
        let rows = store
            .insert(RESTAURANTS, vec![json!({ "name": "Old" })], "id, updated_at")
            .await
            .unwrap();
        let id = rows[0]["id"].clone();

        let updated = store
            .update(
                RESTAURANTS,
                json!({ "name": "New" }),
                &[Filter { column: "id", value: id.clone() }],
                "name, updated_at",
            )
            .await
            .unwrap();
        assert_eq!(updated[0]["name"], json!("New"));
        assert_ne!(updated[0]["updated_at"], rows[0]["updated_at"]);

        store
            .delete(RESTAURANTS, &[Filter { column: "id", value: id }])
            .await
            .unwrap();
        assert_eq!(store.len(RESTAURANTS).await, 0);
    }

    #[tokio::test]
    async fn test_auth_flow() {
        let auth = MemoryAuth::new();
        auth.register("owner@x.com", "secret").await;

        assert!(auth.sign_in("owner@x.com", "wrong").await.is_err());
        let session = auth.sign_in("owner@x.com", "secret").await.unwrap();
        assert_eq!(auth.credential_checks(), 2);

        let user = auth.user(&session.access_token).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("owner@x.com"));

        auth.expire(&session.access_token).await;
        assert!(auth.user(&session.access_token).await.is_err());

        let refreshed = auth.refresh(&session.refresh_token).await.unwrap();
        assert!(auth.refresh(&session.refresh_token).await.is_err());

        auth.sign_out(&refreshed.access_token).await.unwrap();
        assert!(auth.user(&refreshed.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_retires_old_access_token() {
        let auth = MemoryAuth::new();
        auth.register("owner@x.com", "secret").await;
        let session = auth.sign_in("owner@x.com", "secret").await.unwrap();

        let refreshed = auth.refresh(&session.refresh_token).await.unwrap();

        assert!(matches!(
            auth.user(&session.access_token).await,
            Err(AuthError::Rejected { status: 401, .. })
        ));
        let user = auth.user(&refreshed.access_token).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("owner@x.com"));
        assert_eq!(auth.accounts.lock().await.access_tokens.len(), 1);
    }

    #[tokio::test]
    async fn test_sign_up_requiring_confirmation() {
        let auth = MemoryAuth::requiring_email_confirm();
        let sign_up = auth.sign_up("new@x.com", "pw").await.unwrap();
        assert!(sign_up.session.is_none());

        let unconfirmed = auth.sign_in("new@x.com", "pw").await;
        assert!(matches!(unconfirmed, Err(AuthError::Rejected { .. })));

        auth.confirm("new@x.com").await;
        assert!(auth.sign_in("new@x.com", "pw").await.is_ok());
    }
}
