//! # Dashboard API
//!
//! Named site operations mapped onto record-store calls. Each call is one round
//! trip except [`DashboardApi::ensure_seeded_restaurants`], which reads, inserts
//! what is missing, then reads again. Nothing is cached or retried, and backend
//! errors come back to the caller untouched.
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    error::StoreError,
    models::{
        CONTACT_SETTINGS, CONTACT_SETTINGS_ID, ContactSettings, ContactUpdate, DashboardSummary,
        MESSAGES, Message, NewMessage, RESTAURANTS, Restaurant, RestaurantUpdate, SUBSCRIPTIONS,
        Subscription,
    },
    records::{ALL_COLUMNS, Filter, Order, RecordStore, Select},
};

const SUBSCRIPTION_COLUMNS: &str = "id, email, created_at";
const MESSAGE_COLUMNS: &str = "id, name, email, subject, message, created_at";
const CONTACT_COLUMNS: &str = "id, phone, email, address, updated_at";
const RESTAURANT_COLUMNS: &str = "id, name, address, description, created_at, updated_at";

pub const DEFAULT_CONTACT_PHONE: &str = "+64 7 574 8500";
pub const DEFAULT_CONTACT_EMAIL: &str = "info@garoonthai.nz";
pub const DEFAULT_CONTACT_ADDRESS: &str = "277 Mount Maunganui Rd, Tauranga 3116";

pub struct SeedRestaurant {
    pub name: &'static str,
    pub address: &'static str,
    pub description: &'static str,
}

pub const DEFAULT_RESTAURANTS: [SeedRestaurant; 2] = [
    SeedRestaurant {
        name: "Easy Go Thai",
        address: "Mount Maunganui",
        description: "Authentic Thai street food.",
    },
    SeedRestaurant {
        name: "Asian Fusion",
        address: "Bethlehem",
        description: "Modern fusion cuisine.",
    },
];

#[derive(Clone)]
pub struct DashboardApi {
    records: Arc<dyn RecordStore>,
    seed_lock: Arc<Mutex<()>>,
}

fn decode<T: DeserializeOwned>(collection: &'static str, row: Value) -> Result<T, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::Malformed {
        collection,
        reason: e.to_string(),
    })
}

fn decode_all<T: DeserializeOwned>(
    collection: &'static str,
    rows: Vec<Value>,
) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(|row| decode(collection, row)).collect()
}

/// The single row a write is expected to echo back.
fn decode_one<T: DeserializeOwned>(
    collection: &'static str,
    rows: Vec<Value>,
) -> Result<T, StoreError> {
    let row = rows
        .into_iter()
        .next()
        .ok_or(StoreError::NotFound { collection })?;

    decode(collection, row)
}

/// Blank subjects are stored as `null`, never as `""`.
pub fn normalize_subject(subject: Option<String>) -> Option<String> {
    subject.filter(|s| !s.trim().is_empty())
}

impl DashboardApi {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self::with_seed_lock(records, Arc::new(Mutex::new(())))
    }

    /// Shares one seeding lock across handles so concurrent seeds in this
    /// process run one after the other.
    pub fn with_seed_lock(records: Arc<dyn RecordStore>, seed_lock: Arc<Mutex<()>>) -> Self {
        Self { records, seed_lock }
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        let rows = self
            .records
            .select(
                SUBSCRIPTIONS,
                &Select::columns(SUBSCRIPTION_COLUMNS).order(Order::desc("created_at")),
            )
            .await?;

        decode_all(SUBSCRIPTIONS, rows)
    }

    pub async fn add_subscription(&self, email: &str) -> Result<Subscription, StoreError> {
        let rows = self
            .records
            .insert(
                SUBSCRIPTIONS,
                vec![json!({ "email": email })],
                SUBSCRIPTION_COLUMNS,
            )
            .await?;

        decode_one(SUBSCRIPTIONS, rows)
    }

    pub async fn list_messages(&self) -> Result<Vec<Message>, StoreError> {
        let rows = self
            .records
            .select(
                MESSAGES,
                &Select::columns(MESSAGE_COLUMNS).order(Order::desc("created_at")),
            )
            .await?;

        decode_all(MESSAGES, rows)
    }

    pub async fn add_message(&self, payload: NewMessage) -> Result<Message, StoreError> {
        let row = json!({
            "name": payload.name,
            "email": payload.email,
            "subject": normalize_subject(payload.subject),
            "message": payload.message,
        });

        let rows = self
            .records
            .insert(MESSAGES, vec![row], MESSAGE_COLUMNS)
            .await?;

        decode_one(MESSAGES, rows)
    }

    pub async fn delete_message(&self, id: &str) -> Result<(), StoreError> {
        self.records
            .delete(MESSAGES, &[Filter::eq("id", id)])
            .await
    }

    /// Reads the singleton, creating it with the default details when absent.
    pub async fn get_contact_settings(&self) -> Result<ContactSettings, StoreError> {
        let rows = self
            .records
            .select(
                CONTACT_SETTINGS,
                &Select::columns(CONTACT_COLUMNS).filter(Filter::eq("id", CONTACT_SETTINGS_ID)),
            )
            .await?;

        if let Some(row) = rows.into_iter().next() {
            return decode(CONTACT_SETTINGS, row);
        }

        info!("No contact settings found, inserting defaults");

        let defaults = json!({
            "id": CONTACT_SETTINGS_ID,
            "phone": DEFAULT_CONTACT_PHONE,
            "email": DEFAULT_CONTACT_EMAIL,
            "address": DEFAULT_CONTACT_ADDRESS,
        });
        let rows = self
            .records
            .insert(CONTACT_SETTINGS, vec![defaults], ALL_COLUMNS)
            .await?;

        decode_one(CONTACT_SETTINGS, rows)
    }

    pub async fn update_contact_settings(
        &self,
        update: ContactUpdate,
    ) -> Result<ContactSettings, StoreError> {
        let patch = json!({
            "phone": update.phone,
            "email": update.email,
            "address": update.address,
        });

        let rows = self
            .records
            .update(
                CONTACT_SETTINGS,
                patch,
                &[Filter::eq("id", CONTACT_SETTINGS_ID)],
                ALL_COLUMNS,
            )
            .await?;

        decode_one(CONTACT_SETTINGS, rows)
    }

    pub async fn list_restaurants(&self) -> Result<Vec<Restaurant>, StoreError> {
        let rows = self
            .records
            .select(
                RESTAURANTS,
                &Select::columns(RESTAURANT_COLUMNS).order(Order::asc("created_at")),
            )
            .await?;

        decode_all(RESTAURANTS, rows)
    }

    pub async fn update_restaurant(
        &self,
        id: &str,
        update: RestaurantUpdate,
    ) -> Result<Restaurant, StoreError> {
        let patch = json!({
            "name": update.name,
            "address": update.address,
            "description": update.description,
        });

        let rows = self
            .records
            .update(RESTAURANTS, patch, &[Filter::eq("id", id)], ALL_COLUMNS)
            .await?;

        decode_one(RESTAURANTS, rows)
    }

    /// Inserts whichever default restaurants are missing by case-insensitive
    /// name, then returns the full list. Not atomic: a failed insert leaves
    /// earlier state in place and a retry picks up from there.
    pub async fn ensure_seeded_restaurants(&self) -> Result<Vec<Restaurant>, StoreError> {
        let _guard = self.seed_lock.lock().await;

        let existing = self.list_restaurants().await?;
        let missing: Vec<Value> = DEFAULT_RESTAURANTS
            .iter()
            .filter(|seed| {
                let name = seed.name.to_lowercase();
                !existing.iter().any(|r| r.name.to_lowercase() == name)
            })
            .map(|seed| {
                json!({
                    "name": seed.name,
                    "address": seed.address,
                    "description": seed.description,
                })
            })
            .collect();

        if !missing.is_empty() {
            info!("Seeding {} default restaurant(s)", missing.len());
            self.records.insert(RESTAURANTS, missing, "id").await?;
        }

        self.list_restaurants().await
    }

    /// Counts for the stat cards, loaded concurrently.
    pub async fn summary(&self) -> Result<DashboardSummary, StoreError> {
        let (subscriptions, messages, restaurants) = tokio::try_join!(
            self.list_subscriptions(),
            self.list_messages(),
            self.ensure_seeded_restaurants(),
        )?;

        Ok(DashboardSummary {
            subscriptions: subscriptions.len(),
            messages: messages.len(),
            restaurants: restaurants.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn api() -> (DashboardApi, MemoryStore) {
        let store = MemoryStore::default();
        (DashboardApi::new(Arc::new(store.clone())), store)
    }

    #[test]
    fn test_normalize_subject() {
        assert_eq!(normalize_subject(None), None);
        assert_eq!(normalize_subject(Some(String::new())), None);
        assert_eq!(normalize_subject(Some("   ".to_string())), None);
        assert_eq!(
            normalize_subject(Some("Booking".to_string())),
            Some("Booking".to_string())
        );
    }

    #[tokio::test]
    async fn test_empty_subject_is_stored_as_null() {
        let (api, store) = api();

        let message = api
            .add_message(NewMessage {
                name: "Jane".to_string(),
                email: "jane@x.com".to_string(),
                subject: Some(String::new()),
                message: "Hello".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(message.subject, None);

        let raw = store
            .select(MESSAGES, &Select::columns("subject"))
            .await
            .unwrap();
        assert_eq!(raw, vec![json!({ "subject": null })]);
    }

    #[tokio::test]
    async fn test_subscriptions_newest_first() {
        let (api, _) = api();

        let first = api.add_subscription("first@x.com").await.unwrap();
        let second = api.add_subscription("second@x.com").await.unwrap();

        let listed = api.list_subscriptions().await.unwrap();
        assert_eq!(listed, vec![second, first]);
    }

    #[tokio::test]
    async fn test_delete_message_only_removes_that_message() {
        let (api, _) = api();
        let sub = api.add_subscription("keep@x.com").await.unwrap();

        let mut ids = Vec::new();
        for name in ["A", "B", "C"] {
            let message = api
                .add_message(NewMessage {
                    name: name.to_string(),
                    email: "a@x.com".to_string(),
                    subject: None,
                    message: "Hi".to_string(),
                })
                .await
                .unwrap();
            ids.push(message.id);
        }

        api.delete_message(&ids[1]).await.unwrap();

        let remaining: Vec<String> = api
            .list_messages()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(remaining, vec![ids[2].clone(), ids[0].clone()]);
        assert_eq!(api.list_subscriptions().await.unwrap(), vec![sub]);
    }

    #[tokio::test]
    async fn test_contact_settings_created_once() {
        let (api, store) = api();

        let created = api.get_contact_settings().await.unwrap();
        assert_eq!(created.id, CONTACT_SETTINGS_ID);
        assert_eq!(created.phone.as_deref(), Some(DEFAULT_CONTACT_PHONE));
        assert_eq!(created.email.as_deref(), Some(DEFAULT_CONTACT_EMAIL));
        assert_eq!(created.address.as_deref(), Some(DEFAULT_CONTACT_ADDRESS));

        let again = api.get_contact_settings().await.unwrap();
        assert_eq!(again, created);
        assert_eq!(store.len(CONTACT_SETTINGS).await, 1);
    }

    #[tokio::test]
    async fn test_update_contact_settings() {
        let (api, _) = api();
        api.get_contact_settings().await.unwrap();

        let updated = api
            .update_contact_settings(ContactUpdate {
                phone: Some("022 402 6481".to_string()),
                email: None,
                address: Some("225 State Highway 2".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("022 402 6481"));
        assert_eq!(updated.email, None);
        assert_eq!(api.get_contact_settings().await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_contact_settings_without_singleton() {
        let (api, _) = api();

        let result = api.update_contact_settings(ContactUpdate::default()).await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let (api, store) = api();

        let first = api.ensure_seeded_restaurants().await.unwrap();
        let second = api.ensure_seeded_restaurants().await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(first[0].name, "Easy Go Thai");
        assert_eq!(first[1].name, "Asian Fusion");
        assert_eq!(store.len(RESTAURANTS).await, 2);
    }

    #[tokio::test]
    async fn test_seeding_matches_names_case_insensitively() {
        let (api, store) = api();
        store
            .insert(RESTAURANTS, vec![json!({ "name": "EASY GO THAI" })], "id")
            .await
            .unwrap();

        let seeded = api.ensure_seeded_restaurants().await.unwrap();
        let names: Vec<&str> = seeded.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["EASY GO THAI", "Asian Fusion"]);
    }

    #[tokio::test]
    async fn test_concurrent_seeding_does_not_duplicate() {
        let (api, store) = api();
        let other = api.clone();

        let (a, b) = tokio::join!(
            api.ensure_seeded_restaurants(),
            other.ensure_seeded_restaurants()
        );

        assert_eq!(a.unwrap().len(), 2);
        assert_eq!(b.unwrap().len(), 2);
        assert_eq!(store.len(RESTAURANTS).await, 2);
    }

    #[tokio::test]
    async fn test_update_restaurant() {
        let (api, _) = api();
        let seeded = api.ensure_seeded_restaurants().await.unwrap();

        let updated = api
            .update_restaurant(
                &seeded[1].id,
                RestaurantUpdate {
                    name: "Asian Fusion Bethlehem".to_string(),
                    address: Some("225 State Highway 2, Bethlehem".to_string()),
                    description: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, seeded[1].id);
        assert_eq!(updated.name, "Asian Fusion Bethlehem");
        assert!(updated.updated_at >= seeded[1].updated_at);

        let missing = api
            .update_restaurant(
                "nope",
                RestaurantUpdate {
                    name: "x".to_string(),
                    address: None,
                    description: None,
                },
            )
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_malformed_rows_fail_fast() {
        let (api, store) = api();
        store
            .insert(MESSAGES, vec![json!({ "email": "x@x.com" })], "id")
            .await
            .unwrap();

        let result = api.list_messages().await;
        assert!(matches!(
            result,
            Err(StoreError::Malformed {
                collection: MESSAGES,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_summary_counts() {
        let (api, _) = api();
        api.add_subscription("a@x.com").await.unwrap();

        let summary = api.summary().await.unwrap();
        assert_eq!(
            summary,
            DashboardSummary {
                subscriptions: 1,
                messages: 0,
                restaurants: 2,
            }
        );
    }
}
