//! # cantina-core: Pure Business Logic for Cantina POS
//!
//! Domain types and rules for selling food and drinks at time-boxed events,
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cantina POS Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Handler layer (HTTP, out of tree)                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │   cantina-engine: stock, carts, settlement, refunds, ledger     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ cantina-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  balance  │  │ validation│  │   │
//! │  │   │ OrderCart │  │   Money   │  │  ledger   │  │  payment  │  │   │
//! │  │   │   Sale    │  │           │  │  math     │  │  sets     │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (OrderCart, Sale, CustomerTransaction, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`balance`] - Balance derivation over a customer's ledger
//! - [`error`] - Domain error types and stable error codes
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use cantina_core::money::Money;
//! use cantina_core::types::{PaymentMethod, PaymentPart};
//! use cantina_core::validation::validate_payments;
//!
//! let parts = [PaymentPart::new(PaymentMethod::Credit, Money::from_cents(1000))];
//! let err = validate_payments(&parts, Money::from_cents(1000), None, Money::from_cents(1))
//!     .unwrap_err();
//! assert_eq!(err.code().as_str(), "ERR_CUSTOMER_REQUIRED_FOR_CREDIT");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod balance;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ErrorCode, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default maximum number of lines in a single cart.
pub const MAX_CART_LINES: usize = 100;

/// Default maximum quantity of a single line.
///
/// Catches typos like 100 instead of 10 at a busy counter.
pub const MAX_LINE_QUANTITY: i64 = 999;

/// Default payment tolerance: payments may differ from the total by 1 cent.
pub const PAYMENT_TOLERANCE: Money = Money::from_cents(1);
