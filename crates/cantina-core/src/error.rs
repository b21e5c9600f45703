//! # Error Types
//!
//! Domain-specific error types for cantina-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  cantina-core errors (this file)                                       │
//! │  ├── CoreError        - Recoverable business rule violations           │
//! │  ├── ValidationError  - Input validation failures                      │
//! │  └── ErrorCode        - Stable machine-readable code per error         │
//! │                                                                         │
//! │  cantina-engine errors (separate crate)                                │
//! │  └── EngineError      - CoreError + fatal invariant violations         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → handler layer       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every `CoreError` is something the caller can fix and retry. Nothing in
//! this file represents a broken invariant; those live in the engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;
use crate::types::OrderStatus;

// =============================================================================
// Error Code
// =============================================================================

/// Stable machine-readable error codes.
///
/// The handler layer maps these to HTTP statuses; the frontend switches on
/// them. Never renumber or rename a code once shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ErrorCode {
    #[serde(rename = "ERR_STOCK_INSUFFICIENT")]
    StockInsufficient,
    #[serde(rename = "ERR_ORDER_NOT_PENDING")]
    OrderNotPending,
    #[serde(rename = "ERR_ORDER_EMPTY")]
    OrderEmpty,
    #[serde(rename = "ERR_NO_PAYMENT")]
    NoPayment,
    #[serde(rename = "ERR_INVALID_PAYMENT_AMOUNT")]
    InvalidPaymentAmount,
    #[serde(rename = "ERR_PAYMENT_MISMATCH")]
    PaymentMismatch,
    #[serde(rename = "ERR_CUSTOMER_REQUIRED_FOR_CREDIT")]
    CustomerRequiredForCredit,
    #[serde(rename = "ERR_SALE_ALREADY_REFUNDED")]
    SaleAlreadyRefunded,
    #[serde(rename = "ERR_EMPTY_REFUND_REASON")]
    EmptyRefundReason,
    #[serde(rename = "ERR_NOT_FOUND")]
    NotFound,
    #[serde(rename = "ERR_VALIDATION")]
    Validation,
    /// Internal state was found inconsistent. Never retried.
    #[serde(rename = "ERR_INVARIANT_VIOLATION")]
    InvariantViolation,
    #[serde(rename = "ERR_CONFIG")]
    Config,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::StockInsufficient => "ERR_STOCK_INSUFFICIENT",
            ErrorCode::OrderNotPending => "ERR_ORDER_NOT_PENDING",
            ErrorCode::OrderEmpty => "ERR_ORDER_EMPTY",
            ErrorCode::NoPayment => "ERR_NO_PAYMENT",
            ErrorCode::InvalidPaymentAmount => "ERR_INVALID_PAYMENT_AMOUNT",
            ErrorCode::PaymentMismatch => "ERR_PAYMENT_MISMATCH",
            ErrorCode::CustomerRequiredForCredit => "ERR_CUSTOMER_REQUIRED_FOR_CREDIT",
            ErrorCode::SaleAlreadyRefunded => "ERR_SALE_ALREADY_REFUNDED",
            ErrorCode::EmptyRefundReason => "ERR_EMPTY_REFUND_REASON",
            ErrorCode::NotFound => "ERR_NOT_FOUND",
            ErrorCode::Validation => "ERR_VALIDATION",
            ErrorCode::InvariantViolation => "ERR_INVARIANT_VIOLATION",
            ErrorCode::Config => "ERR_CONFIG",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. They are returned to
/// the caller, who may correct the input and retry.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested quantity exceeds what the item has left.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart A holds the last 2 "Pastel"
    ///      │
    ///      ▼
    /// Cart B asks for +3 ──► available = 0
    ///      │
    ///      ▼
    /// StockInsufficient { available: 0, requested: 3 }
    ///      │
    ///      ▼
    /// UI shows: "Pastel is sold out"
    /// ```
    #[error("Insufficient stock for {menu_item_id}: available {available}, requested {requested}")]
    StockInsufficient {
        menu_item_id: String,
        /// Additional units the item can still take (0 if sold out).
        available: i64,
        requested: i64,
    },

    /// The cart is confirmed or cancelled.
    #[error("Order {order_id} is {status}, expected open")]
    OrderNotPending {
        order_id: String,
        status: OrderStatus,
    },

    /// The cart has no lines.
    #[error("Order {order_id} has no items")]
    OrderEmpty { order_id: String },

    /// No payment parts were supplied.
    #[error("At least one payment is required")]
    NoPayment,

    /// A payment part is zero or negative.
    #[error("Payment #{index} has invalid amount {amount}")]
    InvalidPaymentAmount { index: usize, amount: Money },

    /// Payments do not add up to the cart total.
    #[error("Payments total {paid} but order total is {total}")]
    PaymentMismatch { paid: Money, total: Money },

    /// A credit ("fiado") payment was used without naming a customer.
    #[error("A customer is required for credit payments")]
    CustomerRequiredForCredit,

    /// The sale has already been refunded.
    #[error("Sale {sale_id} was already refunded")]
    SaleAlreadyRefunded { sale_id: String },

    /// Refund reason is blank.
    #[error("A refund reason is required")]
    EmptyRefundReason,

    #[error("Menu item not found: {0}")]
    MenuItemNotFound(String),

    /// The item belongs to a different event than the cart.
    #[error("Menu item {menu_item_id} is not sold at event {event_id}")]
    MenuItemNotInEvent {
        menu_item_id: String,
        event_id: String,
    },

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Order {order_id} has no line for {menu_item_id}")]
    LineNotFound {
        order_id: String,
        menu_item_id: String,
    },

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} lines")]
    CartTooLarge { max: usize },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::StockInsufficient { .. } => ErrorCode::StockInsufficient,
            CoreError::OrderNotPending { .. } => ErrorCode::OrderNotPending,
            CoreError::OrderEmpty { .. } => ErrorCode::OrderEmpty,
            CoreError::NoPayment => ErrorCode::NoPayment,
            CoreError::InvalidPaymentAmount { .. } => ErrorCode::InvalidPaymentAmount,
            CoreError::PaymentMismatch { .. } => ErrorCode::PaymentMismatch,
            CoreError::CustomerRequiredForCredit => ErrorCode::CustomerRequiredForCredit,
            CoreError::SaleAlreadyRefunded { .. } => ErrorCode::SaleAlreadyRefunded,
            CoreError::EmptyRefundReason => ErrorCode::EmptyRefundReason,
            CoreError::MenuItemNotFound(_)
            | CoreError::OrderNotFound(_)
            | CoreError::SaleNotFound(_)
            | CoreError::CustomerNotFound(_)
            | CoreError::LineNotFound { .. } => ErrorCode::NotFound,
            CoreError::MenuItemNotInEvent { .. }
            | CoreError::CartTooLarge { .. }
            | CoreError::Validation(_) => ErrorCode::Validation,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::StockInsufficient {
            menu_item_id: "pastel".to_string(),
            available: 1,
            requested: 3,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for pastel: available 1, requested 3"
        );

        let err = CoreError::PaymentMismatch {
            paid: Money::from_cents(900),
            total: Money::from_cents(1000),
        };
        assert_eq!(err.to_string(), "Payments total 9.00 but order total is 10.00");
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            CoreError::CustomerRequiredForCredit.code().as_str(),
            "ERR_CUSTOMER_REQUIRED_FOR_CREDIT"
        );
        assert_eq!(CoreError::NoPayment.code(), ErrorCode::NoPayment);
        assert_eq!(
            CoreError::SaleNotFound("s1".into()).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            CoreError::OrderNotPending {
                order_id: "o1".into(),
                status: OrderStatus::Cancelled,
            }
            .code()
            .to_string(),
            "ERR_ORDER_NOT_PENDING"
        );
    }

    #[test]
    fn test_error_code_serializes_as_string_code() {
        let json = serde_json::to_string(&ErrorCode::SaleAlreadyRefunded).unwrap();
        assert_eq!(json, "\"ERR_SALE_ALREADY_REFUNDED\"");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "staff id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
        assert_eq!(core_err.code(), ErrorCode::Validation);
    }
}
