//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use cantina_core::{CustomerAccount, MenuItem, Money, PaymentMethod, PaymentPart};
use cantina_engine::{CantinaEngine, EngineConfig, InMemoryCatalog, InMemoryCustomers, MemoryAuditSink};

pub const EVENT: &str = "festa-junina";
pub const STAFF: &str = "ana";

pub fn menu_item(id: &str, price_cents: i64, capacity: i64) -> MenuItem {
    MenuItem {
        id: id.to_string(),
        event_id: EVENT.to_string(),
        name: format!("Item {}", id),
        price: Money::from_cents(price_cents),
        capacity,
        sold_count: 0,
    }
}

pub fn customer(id: &str, initial_cents: i64) -> CustomerAccount {
    CustomerAccount {
        id: id.to_string(),
        name: format!("Customer {}", id),
        initial_balance: Money::from_cents(initial_cents),
    }
}

pub fn pay(method: PaymentMethod, cents: i64) -> PaymentPart {
    PaymentPart::new(method, Money::from_cents(cents))
}

pub struct TestEngine {
    pub engine: CantinaEngine,
    pub audit: MemoryAuditSink,
}

pub fn engine_with(items: Vec<MenuItem>, customers: Vec<CustomerAccount>) -> TestEngine {
    let audit = MemoryAuditSink::new();
    let engine = CantinaEngine::new(
        EngineConfig::default(),
        Arc::new(InMemoryCatalog::with_items(items)),
        Arc::new(InMemoryCustomers::with_accounts(customers)),
        Arc::new(audit.clone()),
    )
    .expect("default config is valid");
    TestEngine { engine, audit }
}

/// Opens a cart holding the given lines and returns its id.
pub fn open_cart(engine: &CantinaEngine, lines: &[(&str, i64)]) -> String {
    let cart = engine.create_order(EVENT, STAFF).unwrap();
    for (item, quantity) in lines {
        let update = engine.add_or_set_line(&cart.id, item, *quantity).unwrap();
        assert!(!update.clamped, "fixture line {} was clamped", item);
    }
    cart.id
}
