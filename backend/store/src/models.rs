//! # Records
//!
//! Typed rows of the five collections the site touches.
//!
//! | Collection | Type | Notes |
//! |---|---|---|
//! | `subscriptions` | [`Subscription`] | append-only |
//! | `messages` | [`Message`] | deletable from the dashboard |
//! | `contact_settings` | [`ContactSettings`] | singleton, `id = 1` |
//! | `restaurants` | [`Restaurant`] | seeded with two defaults |
//! | `users` | [`AuthorizedUser`] | login allow-list |
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const SUBSCRIPTIONS: &str = "subscriptions";
pub const MESSAGES: &str = "messages";
pub const CONTACT_SETTINGS: &str = "contact_settings";
pub const RESTAURANTS: &str = "restaurants";
pub const USERS: &str = "users";

pub const CONTACT_SETTINGS_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSettings {
    pub id: i64,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedUser {
    pub email: String,
}

/// Contact form submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestaurantUpdate {
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
}

/// Counts shown on the dashboard stat cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub subscriptions: usize,
    pub messages: usize,
    pub restaurants: usize,
}
