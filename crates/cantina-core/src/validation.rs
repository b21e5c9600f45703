//! # Validation Module
//!
//! Business-rule validation for settlement and refunds.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Handler layer (out of tree)                                  │
//! │  ├── Schema checks, trimming, type coercion                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (pure)                                           │
//! │  ├── Payment set against cart total                                    │
//! │  ├── Credit needs a customer                                           │
//! │  └── Refund reason, ledger amounts, staff ids                          │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: cantina-engine                                               │
//! │  └── Stock ceilings and status checks under lock                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is retryable: the caller fixes the input and calls again.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentPart, PaymentSummary};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Payments
// =============================================================================

/// Validates a proposed payment set for a cart total.
///
/// ## Rules (checked in this order)
/// 1. At least one part (`NoPayment`)
/// 2. Every part > 0, and the running sum fits in an i64 (`InvalidPaymentAmount`)
/// 3. `|Σ parts − total| <= tolerance` (`PaymentMismatch`)
/// 4. Any `Credit` part needs a customer (`CustomerRequiredForCredit`)
///
/// ## Example
/// ```rust
/// use cantina_core::money::Money;
/// use cantina_core::types::{PaymentMethod, PaymentPart};
/// use cantina_core::validation::validate_payments;
///
/// let parts = [
///     PaymentPart::new(PaymentMethod::Cash, Money::from_cents(600)),
///     PaymentPart::new(PaymentMethod::Card, Money::from_cents(400)),
/// ];
/// let summary = validate_payments(&parts, Money::from_cents(1000), None, Money::from_cents(1)).unwrap();
/// assert_eq!(summary.paid.cents(), 1000);
/// ```
pub fn validate_payments(
    payments: &[PaymentPart],
    total: Money,
    customer_id: Option<&str>,
    tolerance: Money,
) -> CoreResult<PaymentSummary> {
    if payments.is_empty() {
        return Err(CoreError::NoPayment);
    }

    if let Some((index, part)) = payments
        .iter()
        .enumerate()
        .find(|(_, p)| !p.amount.is_positive())
    {
        return Err(CoreError::InvalidPaymentAmount {
            index,
            amount: part.amount,
        });
    }

    let summary = PaymentSummary::of(payments).map_err(|index| CoreError::InvalidPaymentAmount {
        index,
        amount: payments[index].amount,
    })?;
    if !summary.paid.within(total, tolerance) {
        return Err(CoreError::PaymentMismatch {
            paid: summary.paid,
            total,
        });
    }

    let has_customer = customer_id.map(|c| !c.trim().is_empty()).unwrap_or(false);
    if summary.credit.is_positive() && !has_customer {
        return Err(CoreError::CustomerRequiredForCredit);
    }

    Ok(summary)
}

// =============================================================================
// Refunds
// =============================================================================

/// Validates a refund reason and returns it trimmed.
///
/// ```rust
/// use cantina_core::validation::validate_refund_reason;
///
/// assert_eq!(validate_refund_reason("  wrong order ").unwrap(), "wrong order");
/// assert!(validate_refund_reason("   ").is_err());
/// ```
pub fn validate_refund_reason(reason: &str) -> CoreResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(CoreError::EmptyRefundReason);
    }
    Ok(reason.to_string())
}

// =============================================================================
// Scalars
// =============================================================================

/// Validates that an identifier (staff id, event id, ...) is present.
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a ledger amount (deposit, withdrawal, credit settlement).
///
/// ## Rules
/// - Must be positive (> 0)
pub fn validate_positive_amount(field: &str, amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Caps a requested line quantity at the configured per-line ceiling.
///
/// Non-positive requests pass through untouched (they mean "remove").
pub fn clamp_line_quantity(requested: i64, max: i64) -> i64 {
    if requested <= 0 {
        requested
    } else {
        requested.min(max)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
