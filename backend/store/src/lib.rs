//! # Store
//!
//! Everything the site knows about its hosted backend.
//!
//! - [`records`]: generic row operations ([`RecordStore`])
//! - [`auth`]: the identity service ([`AuthProvider`])
//! - [`remote`]: both of the above over HTTP, against Supabase
//! - [`memory`]: both of the above in process, for tests and local runs
//! - [`dashboard`]: the named site operations ([`DashboardApi`])
//! - [`session`]: signed-in state and the login allow-list ([`SessionGate`])
//!
//! ## Collections
//!
//! | Name | Written by | Read by |
//! |---|---|---|
//! | `subscriptions` | public newsletter form | dashboard |
//! | `messages` | public contact form | dashboard (with delete) |
//! | `contact_settings` | dashboard | dashboard |
//! | `restaurants` | seeding, dashboard | dashboard |
//! | `users` | operators, out of band | login allow-list |
//!
//! The backend's row-level security decides what an anonymous key may do; the
//! dashboard calls run with the signed-in operator's access token.

pub mod auth;
pub mod dashboard;
pub mod error;
pub mod memory;
pub mod models;
pub mod records;
pub mod remote;
pub mod session;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use auth::{AuthProvider, AuthSession, SignUp, User};
pub use dashboard::DashboardApi;
pub use error::{AuthError, SessionError, StoreError};
pub use memory::{MemoryAuth, MemoryStore};
pub use records::{Filter, Order, RecordStore, Select};
pub use remote::SupabaseClient;
pub use session::{PersistedSession, SessionEvent, SessionGate, SignUpOutcome};

/// Both collaborators, as handed to the server and the seed tool.
#[derive(Clone)]
pub struct Backend {
    pub records: Arc<dyn RecordStore>,
    pub auth: Arc<dyn AuthProvider>,
    seed_lock: Arc<Mutex<()>>,
}

impl Backend {
    pub fn supabase(client: SupabaseClient) -> Self {
        let client = Arc::new(client);

        Self::new(client.clone(), client)
    }

    pub fn new(records: Arc<dyn RecordStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            records,
            auth,
            seed_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn memory(records: MemoryStore, auth: MemoryAuth) -> Self {
        Self::new(Arc::new(records), Arc::new(auth))
    }

    /// A session gate for one visitor, checked against the persisted tokens.
    pub async fn session(&self, persisted: Option<PersistedSession>) -> SessionGate {
        SessionGate::restore(self.auth.clone(), self.records.clone(), persisted).await
    }

    /// Dashboard operations on behalf of a signed-in operator.
    pub fn dashboard_for(&self, access_token: &str) -> DashboardApi {
        DashboardApi::with_seed_lock(
            self.records.with_access_token(access_token),
            self.seed_lock.clone(),
        )
    }

    /// Dashboard operations with the public key only, as the site's forms use.
    pub fn public_dashboard(&self) -> DashboardApi {
        DashboardApi::with_seed_lock(self.records.clone(), self.seed_lock.clone())
    }
}
