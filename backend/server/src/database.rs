//! # Backend
//!
//! Builds the record and auth collaborators named by [`BackendKind`].
//!
//! ## Supabase
//!
//! - PostgREST under `/rest/v1`, GoTrue under `/auth/v1`
//! - The anon key goes out on every request; a signed-in operator's access
//!   token replaces it as the bearer so row-level security applies
//! - Nothing is checked at startup, the first request surfaces a bad key
//!
//! ## Memory
//!
//! - Collections and accounts live in the process and vanish on restart
//! - `GAROON_DEV_ADMIN_EMAIL` / `GAROON_DEV_ADMIN_PASSWORD` register one
//!   confirmed account and put it on the `users` allow-list
use anyhow::Context;
use serde_json::json;
use store::{Backend, MemoryAuth, MemoryStore, RecordStore, SupabaseClient, models::USERS};
use tracing::info;

use crate::config::{BackendKind, Config, Credentials};

pub async fn init_backend(config: &Config) -> anyhow::Result<Backend> {
    match config.backend {
        BackendKind::Supabase => {
            info!("Using Supabase at {}", config.supabase_url);

            let client = SupabaseClient::new(
                &config.supabase_url,
                &config.supabase_key,
                config.http_timeout,
            )
            .context("Failed to build the Supabase HTTP client")?;

            Ok(Backend::supabase(client))
        }
        BackendKind::Memory => {
            info!("Using the in-memory backend, data is not persisted");

            let records = MemoryStore::default();
            let auth = MemoryAuth::new();

            if let Some(admin) = &config.dev_admin {
                register_admin(&records, &auth, admin).await?;
            }

            Ok(Backend::memory(records, auth))
        }
    }
}

/// Registers a confirmed account and allow-lists it.
pub async fn register_admin(
    records: &MemoryStore,
    auth: &MemoryAuth,
    admin: &Credentials,
) -> anyhow::Result<()> {
    auth.register(&admin.email, &admin.password).await;
    records
        .insert(USERS, vec![json!({ "email": admin.email })], "email")
        .await
        .with_context(|| format!("Failed to allow-list {}", admin.email))?;

    info!("Registered development operator {}", admin.email);

    Ok(())
}
