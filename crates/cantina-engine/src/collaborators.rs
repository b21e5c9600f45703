//! # Collaborators
//!
//! Narrow interfaces the engine consumes from services it does not own.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Engine Collaborators                           │
//! │                                                                         │
//! │   Catalog service ─────► MenuCatalog::menu_item(id)                     │
//! │                          id → { event, name, price, capacity, sold }    │
//! │                                                                         │
//! │   Customer mgmt ───────► CustomerDirectory::customer(id)                │
//! │                          id → { name, initial_balance }                 │
//! │                                                                         │
//! │   Audit log ◄────────── AuditSink::record(AuditEntry)                   │
//! │                          fire-and-forget, never fails the operation     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The in-memory implementations back the tests and any embedding that
//! keeps the catalog in process.

use std::sync::Arc;

use cantina_core::{CustomerAccount, MenuItem};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

// =============================================================================
// Traits
// =============================================================================

/// Read access to the menu catalog.
pub trait MenuCatalog: Send + Sync {
    fn menu_item(&self, id: &str) -> Option<MenuItem>;
}

/// Read access to customer accounts.
pub trait CustomerDirectory: Send + Sync {
    fn customer(&self, id: &str) -> Option<CustomerAccount>;
}

/// Fire-and-forget audit log.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

// =============================================================================
// Audit Entry
// =============================================================================

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// "order", "sale", "customer_transaction", ...
    pub entity_type: String,
    pub entity_id: String,
    /// "create", "cancel", "confirm", "refund", ...
    pub action: String,
    pub previous_value: Option<Value>,
    pub new_value: Value,
    pub user_id: String,
    pub at: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        entity_type: &str,
        entity_id: impl Into<String>,
        action: &str,
        new_value: Value,
        user_id: impl Into<String>,
    ) -> Self {
        AuditEntry {
            entity_type: entity_type.to_string(),
            entity_id: entity_id.into(),
            action: action.to_string(),
            previous_value: None,
            new_value,
            user_id: user_id.into(),
            at: Utc::now(),
        }
    }

    pub fn with_previous(mut self, previous: Value) -> Self {
        self.previous_value = Some(previous);
        self
    }
}

/// Serializes a value for an audit entry, falling back to `null`.
pub(crate) fn audit_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

// =============================================================================
// In-Memory Catalog
// =============================================================================

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    items: DashMap<String, MenuItem>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = MenuItem>) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.upsert(item);
        }
        catalog
    }

    /// Inserts or replaces an item.
    ///
    /// Stock records already loaded by the engine keep their own counters;
    /// only name and price changes reach new cart lines.
    pub fn upsert(&self, item: MenuItem) {
        self.items.insert(item.id.clone(), item);
    }
}

impl MenuCatalog for InMemoryCatalog {
    fn menu_item(&self, id: &str) -> Option<MenuItem> {
        self.items.get(id).map(|entry| entry.value().clone())
    }
}

// =============================================================================
// In-Memory Customers
// =============================================================================

#[derive(Debug, Default)]
pub struct InMemoryCustomers {
    accounts: DashMap<String, CustomerAccount>,
}

impl InMemoryCustomers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(accounts: impl IntoIterator<Item = CustomerAccount>) -> Self {
        let directory = Self::new();
        for account in accounts {
            directory.upsert(account);
        }
        directory
    }

    pub fn upsert(&self, account: CustomerAccount) {
        self.accounts.insert(account.id.clone(), account);
    }
}

impl CustomerDirectory for InMemoryCustomers {
    fn customer(&self, id: &str) -> Option<CustomerAccount> {
        self.accounts.get(id).map(|entry| entry.value().clone())
    }
}

// =============================================================================
// Audit Sinks
// =============================================================================

/// Writes audit entries as tracing events on target `cantina::audit`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        info!(
            target: "cantina::audit",
            entity_type = %entry.entity_type,
            entity_id = %entry.entity_id,
            action = %entry.action,
            user_id = %entry.user_id,
            previous = ?entry.previous_value,
            new = %entry.new_value,
            "audit"
        );
    }
}

/// Keeps audit entries in memory so tests can inspect them.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditSink {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }

    /// Entries for one entity type and action, in recording order.
    pub fn find(&self, entity_type: &str, action: &str) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.entity_type == entity_type && e.action == action)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        self.entries.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cantina_core::Money;
    use serde_json::json;

    #[test]
    fn test_catalog_lookup() {
        let catalog = InMemoryCatalog::with_items([MenuItem {
            id: "pastel".into(),
            event_id: "e1".into(),
            name: "Pastel".into(),
            price: Money::from_cents(800),
            capacity: 10,
            sold_count: 0,
        }]);
        assert_eq!(catalog.menu_item("pastel").unwrap().name, "Pastel");
        assert!(catalog.menu_item("caldo").is_none());
    }

    #[test]
    fn test_customer_lookup() {
        let customers = InMemoryCustomers::with_accounts([CustomerAccount {
            id: "c1".into(),
            name: "Dona Maria".into(),
            initial_balance: Money::from_cents(-500),
        }]);
        assert_eq!(customers.customer("c1").unwrap().initial_balance.cents(), -500);
        assert!(customers.customer("c2").is_none());
    }

    #[test]
    fn test_memory_audit_sink() {
        let sink = MemoryAuditSink::new();
        let shared = sink.clone();
        shared.record(AuditEntry::new("order", "o1", "create", json!({"lines": 0}), "ana"));
        shared.record(
            AuditEntry::new("order", "o1", "cancel", json!("cancelled"), "ana")
                .with_previous(json!("open")),
        );

        assert_eq!(sink.len(), 2);
        let cancels = sink.find("order", "cancel");
        assert_eq!(cancels.len(), 1);
        assert_eq!(cancels[0].previous_value, Some(json!("open")));
    }

    #[test]
    fn test_audit_entry_serializes_camel_case() {
        let entry = AuditEntry::new("sale", "s1", "refund", json!(true), "ana");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["entityType"], "sale");
        assert_eq!(json["userId"], "ana");
        assert!(json["previousValue"].is_null());
    }
}
