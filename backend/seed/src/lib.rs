//! # Seed
//!
//! Operator tool for preparing a fresh Supabase project. It signs in like the
//! dashboard does (allow-list first, then the auth service) and runs one task
//! with the operator's token, so row-level security applies the same way.
//!
//! ```sh
//! SUPABASE_URL=... SUPABASE_ANON_KEY=... GAROON_ADMIN_PASSWORD=... \
//! cargo run -p seed -- --email owner@example.com restaurants
//! ```
use anyhow::Context;
use server::{config::Config, database::init_backend};
use store::Backend;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Restaurants,
    Contact,
    Status,
}

pub async fn run(email: &str, password: &str, task: Task) -> anyhow::Result<Vec<String>> {
    let config = Config::load()?;
    let backend = init_backend(&config).await?;

    run_with(&backend, email, password, task).await
}

pub async fn run_with(
    backend: &Backend,
    email: &str,
    password: &str,
    task: Task,
) -> anyhow::Result<Vec<String>> {
    let gate = backend.session(None).await;
    gate.login(email, password)
        .await
        .with_context(|| format!("Sign in as {email} failed"))?;

    let token = gate
        .access_token()
        .context("Signed in without an access token")?;
    let api = backend.dashboard_for(&token);

    info!("Running {task:?} as {email}");

    let result: Result<Vec<String>, _> = match task {
        Task::Restaurants => api.ensure_seeded_restaurants().await.map(|restaurants| {
            restaurants
                .into_iter()
                .map(|r| format!("{}: {}", r.name, r.address.unwrap_or_default()))
                .collect()
        }),
        Task::Contact => api.get_contact_settings().await.map(|contact| {
            vec![
                format!("phone: {}", contact.phone.unwrap_or_default()),
                format!("email: {}", contact.email.unwrap_or_default()),
                format!("address: {}", contact.address.unwrap_or_default()),
            ]
        }),
        Task::Status => api.summary().await.map(|summary| {
            vec![
                format!("subscriptions: {}", summary.subscriptions),
                format!("messages: {}", summary.messages),
                format!("restaurants: {}", summary.restaurants),
            ]
        }),
    };

    gate.logout().await;

    Ok(result?)
}
