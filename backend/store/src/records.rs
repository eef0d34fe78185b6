//! # Record store
//!
//! The generic row-oriented surface of the hosted backend: select with
//! equality filters and one ordering column, insert returning the stored rows,
//! update returning the patched rows, and delete by filter.
//!
//! Rows travel as [`serde_json::Value`] objects. Turning them into typed records
//! is the job of [`crate::dashboard`], so malformed rows fail there, at the
//! boundary, instead of leaking partial data into callers.
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Every column of a collection.
pub const ALL_COLUMNS: &str = "*";

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn desc(column: &'static str) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub columns: &'static str,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Select {
    pub fn columns(columns: &'static str) -> Self {
        Self {
            columns,
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }
}

/// Splits a `"id, email"` style column list. `None` means every column.
pub fn column_list(columns: &str) -> Option<Vec<&str>> {
    if columns.trim() == ALL_COLUMNS {
        return None;
    }

    Some(
        columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect(),
    )
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, collection: &str, query: &Select) -> Result<Vec<Value>, StoreError>;

    async fn insert(
        &self,
        collection: &str,
        rows: Vec<Value>,
        returning: &str,
    ) -> Result<Vec<Value>, StoreError>;

    async fn update(
        &self,
        collection: &str,
        patch: Value,
        filters: &[Filter],
        returning: &str,
    ) -> Result<Vec<Value>, StoreError>;

    async fn delete(&self, collection: &str, filters: &[Filter]) -> Result<(), StoreError>;

    /// A handle that issues the same calls on behalf of a signed-in user.
    fn with_access_token(&self, access_token: &str) -> Arc<dyn RecordStore>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_list() {
        assert_eq!(column_list("*"), None);
        assert_eq!(column_list(" * "), None);
        assert_eq!(
            column_list("id, email,created_at"),
            Some(vec!["id", "email", "created_at"])
        );
        assert_eq!(column_list("id,,name, "), Some(vec!["id", "name"]));
    }

    #[test]
    fn test_select_builder() {
        let query = Select::columns("id")
            .filter(Filter::eq("id", 1))
            .order(Order::desc("created_at"));

        assert_eq!(query.filters, vec![Filter::eq("id", 1)]);
        assert_eq!(query.order, Some(Order::desc("created_at")));
        assert!(!query.order.unwrap().ascending);
    }
}
