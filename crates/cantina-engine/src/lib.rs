//! # cantina-engine: Order-to-Sale Settlement
//!
//! Reserves stock for open carts, settles carts into immutable sales,
//! keeps each customer's credit ledger, and reverses sales on refund.
//!
//! ## Module Organization
//! ```text
//! cantina_engine/
//! ├── lib.rs            ◄─── You are here (exports)
//! ├── engine.rs         ◄─── CantinaEngine facade
//! ├── stock.rs          ◄─── StockLedger (per-item counters)
//! ├── cart.rs           ◄─── CartRegistry (open carts, reservations)
//! ├── settlement.rs     ◄─── SettlementEngine::confirm
//! ├── refund.rs         ◄─── RefundProcessor::refund
//! ├── ledger.rs         ◄─── CustomerLedger (fiado)
//! ├── sales.rs          ◄─── SaleBook
//! ├── collaborators.rs  ◄─── Catalog, customers, audit sink
//! ├── config.rs         ◄─── EngineConfig (TOML + env)
//! ├── logging.rs        ◄─── tracing subscriber
//! └── error.rs          ◄─── EngineError, ErrorBody
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use cantina_core::{MenuItem, Money, PaymentMethod, PaymentPart};
//! use cantina_engine::{CantinaEngine, InMemoryCatalog, InMemoryCustomers};
//!
//! let catalog = InMemoryCatalog::with_items([MenuItem {
//!     id: "pastel".into(),
//!     event_id: "festa".into(),
//!     name: "Pastel".into(),
//!     price: Money::from_cents(800),
//!     capacity: 50,
//!     sold_count: 0,
//! }]);
//! let engine =
//!     CantinaEngine::with_defaults(Arc::new(catalog), Arc::new(InMemoryCustomers::new())).unwrap();
//!
//! let cart = engine.create_order("festa", "ana").unwrap();
//! engine.add_or_set_line(&cart.id, "pastel", 2).unwrap();
//!
//! let sale = engine
//!     .confirm(
//!         &cart.id,
//!         &[PaymentPart::new(PaymentMethod::Cash, Money::from_cents(1600))],
//!         "ana",
//!         None,
//!     )
//!     .unwrap();
//! assert!(sale.is_paid);
//! ```

pub mod cart;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod refund;
pub mod sales;
pub mod settlement;
pub mod stock;

pub use cart::CartRegistry;
pub use collaborators::{
    AuditEntry, AuditSink, CustomerDirectory, InMemoryCatalog, InMemoryCustomers, MemoryAuditSink,
    MenuCatalog, TracingAuditSink,
};
pub use config::{EngineConfig, LoggingSettings, SettlementSettings};
pub use engine::CantinaEngine;
pub use error::{EngineError, EngineResult, ErrorBody};
pub use ledger::{CustomerLedger, LedgerHistory};
pub use logging::{init_tracing, try_init_tracing};
pub use refund::RefundProcessor;
pub use sales::SaleBook;
pub use settlement::SettlementEngine;
pub use stock::{ReleaseMode, Reservation, StockLedger, StockLevel};
