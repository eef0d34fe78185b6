//! Documentation of the Garoon Thai restaurant site backend.
//!
//!
//!
//! # General Infrastructure
//! - Visitors hit this server directly, it renders the pages and serves the JSON API
//! - Records live in Supabase (PostgREST), identities in Supabase Auth (GoTrue)
//! - The server holds no state of its own beyond configuration
//! - A `memory` backend stands in for Supabase during development and tests
//!
//!
//!
//! # Sessions
//!
//! **Goal**: Only allow-listed operators reach the dashboard, and the database
//! sees their own token so row-level security still applies.
//!
//! - Login checks the `users` allow-list before any password is sent upstream
//! - On success the access and refresh tokens go into two `HttpOnly` cookies
//! - Each request restores a session gate from the cookies and checks it
//! - An expired access token is refreshed once, the new pair replaces the cookies
//! - A rejected pair clears both cookies
//!
//!
//!
//! # Routes
//!
//! | Path | Who |
//! |---|---|
//! | `/`, `/about`, `/our-stores`, `/stores/*`, `/contact` | everyone |
//! | `/login`, `/signup`, `/logout` | everyone |
//! | `/api/subscriptions`, `/api/messages`, `/api/session` | everyone |
//! | `/dashboard`, `/api/dashboard/*` | signed in |
//!
//!
//!
//! # Setup
//!
//! Run against Supabase.
//! ```sh
//! SUPABASE_URL=https://<project>.supabase.co SUPABASE_ANON_KEY=... cargo run -p garoon
//! ```
//!
//! Run without Supabase, with one operator account.
//! ```sh
//! GAROON_BACKEND=memory GAROON_SECURE_COOKIES=false \
//! GAROON_DEV_ADMIN_EMAIL=owner@example.com GAROON_DEV_ADMIN_PASSWORD=secret \
//! RUST_LOG=info cargo run -p garoon
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{
        HeaderValue, Method,
        header::{CONTENT_TYPE, COOKIE},
    },
    middleware::from_fn,
    routing::{delete, get, post, put},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod database;
pub mod error;
pub mod middleware;
pub mod pages;
pub mod routes;
pub mod session;
pub mod state;
pub mod utils;

use auth::{login_handler, login_page, logout_handler, signup_handler, signup_page};
use dashboard::{
    contact_handler, dashboard_page, delete_message_handler, messages_handler,
    restaurants_handler, subscriptions_handler, summary_handler, update_contact_handler,
    update_restaurant_handler,
};
use middleware::request_tracing;
use pages::{
    about_page, asian_fusion_page, contact_page, easy_go_thai_page, home_page, not_found_page,
    stores_page,
};
use routes::{message_handler, session_handler, subscribe_handler};
use state::State;

fn cors(allowed_origin: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, COOKIE])
        .max_age(Duration::from_secs(60 * 60));

    match allowed_origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => cors.allow_origin(origin).allow_credentials(true),
        Some(Err(e)) => {
            warn!("Ignoring invalid GAROON_ALLOWED_ORIGIN: {e}");
            cors
        }
        None => cors,
    }
}

pub fn app(state: Arc<State>) -> Router {
    let cors = cors(state.config.allowed_origin.as_deref());

    Router::new()
        .route("/", get(home_page))
        .route("/about", get(about_page))
        .route("/our-stores", get(stores_page))
        .route("/stores/easy-go-thai", get(easy_go_thai_page))
        .route("/stores/asian-fusion", get(asian_fusion_page))
        .route("/contact", get(contact_page))
        .route("/login", get(login_page).post(login_handler))
        .route("/signup", get(signup_page).post(signup_handler))
        .route("/logout", post(logout_handler))
        .route("/dashboard", get(dashboard_page))
        .route("/api/subscriptions", post(subscribe_handler))
        .route("/api/messages", post(message_handler))
        .route("/api/session", get(session_handler))
        .route("/api/dashboard/summary", get(summary_handler))
        .route("/api/dashboard/subscriptions", get(subscriptions_handler))
        .route("/api/dashboard/messages", get(messages_handler))
        .route(
            "/api/dashboard/messages/{id}",
            delete(delete_message_handler),
        )
        .route(
            "/api/dashboard/contact",
            get(contact_handler).put(update_contact_handler),
        )
        .route("/api/dashboard/restaurants", get(restaurants_handler))
        .route(
            "/api/dashboard/restaurants/{id}",
            put(update_restaurant_handler),
        )
        .fallback(not_found_page)
        .layer(cors)
        .layer(from_fn(request_tracing))
        .with_state(state)
}

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let state = State::new().await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = app(state);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
