//! # Balance Derivation
//!
//! A customer's balance is never stored; it is recomputed from the ledger:
//!
//! ```text
//! balance = initial_balance
//!         + Σ deposit.amount
//!         − Σ withdrawal.amount
//!         − Σ (purchase.amount − purchase.amount_paid)
//!         + Σ refund.amount
//! ```
//!
//! Negative means the customer owes money.
//!
//! A refunded purchase still counts towards the balance (its refund entry
//! offsets it) but is no longer debt: it is left out of
//! [`outstanding_debt`] and never picked by [`apply_credit_settlement`].

use std::collections::HashSet;

use crate::money::Money;
use crate::types::{CreditAllocation, CreditSettlement, CustomerTransaction, TransactionType};

/// Derives the current balance from an initial balance and a ledger.
///
/// ```rust
/// use cantina_core::balance::derive_balance;
/// use cantina_core::money::Money;
/// use cantina_core::types::CustomerTransaction;
///
/// let ledger = vec![
///     CustomerTransaction::deposit("c1", Money::from_cents(2000), "ana"),
///     CustomerTransaction::withdrawal("c1", Money::from_cents(500), "ana"),
/// ];
/// assert_eq!(derive_balance(Money::from_cents(-300), &ledger).cents(), 1200);
/// ```
pub fn derive_balance(initial_balance: Money, transactions: &[CustomerTransaction]) -> Money {
    initial_balance
        + transactions
            .iter()
            .map(CustomerTransaction::balance_effect)
            .sum::<Money>()
}

/// Σ unpaid debt over purchases that were not refunded.
pub fn outstanding_debt(transactions: &[CustomerTransaction]) -> Money {
    let refunded = refunded_sales(transactions);
    transactions
        .iter()
        .filter(|t| !is_refunded(t, &refunded))
        .map(CustomerTransaction::outstanding)
        .sum()
}

/// |initial_balance| + Σ amount over every entry.
///
/// Bounds the magnitude of the balance and of every partial sum taken
/// while deriving it. `None` when that bound does not fit in an i64.
pub fn ledger_volume(initial_balance: Money, transactions: &[CustomerTransaction]) -> Option<Money> {
    let start = Money::from_cents(initial_balance.cents().checked_abs()?);
    transactions
        .iter()
        .try_fold(start, |acc, t| acc.checked_add(t.amount))
}

fn refunded_sales(transactions: &[CustomerTransaction]) -> HashSet<String> {
    transactions
        .iter()
        .filter(|t| t.kind == TransactionType::Refund)
        .filter_map(|t| t.sale_id.clone())
        .collect()
}

fn is_refunded(tx: &CustomerTransaction, refunded: &HashSet<String>) -> bool {
    tx.sale_id
        .as_ref()
        .map(|id| refunded.contains(id))
        .unwrap_or(false)
}

/// Applies `amount` to unpaid purchases, oldest first.
///
/// Each purchase's `amount_paid` grows by at most its outstanding debt, so
/// `amount_paid <= amount` always holds. Whatever is left over is returned
/// as the remainder. Non-purchase entries and refunded purchases are never
/// touched.
pub fn apply_credit_settlement(
    transactions: &mut [CustomerTransaction],
    amount: Money,
) -> CreditSettlement {
    let refunded = refunded_sales(transactions);
    let mut left = amount.non_negative();
    let mut allocations = Vec::new();

    // Ledger order is append order, so iteration order is oldest first.
    for tx in transactions
        .iter_mut()
        .filter(|t| t.kind == TransactionType::Purchase)
    {
        if is_refunded(tx, &refunded) {
            continue;
        }
        if left.is_zero() {
            break;
        }
        let outstanding = tx.outstanding();
        if outstanding.is_zero() {
            continue;
        }

        let applied = outstanding.min(left);
        tx.amount_paid += applied;
        left -= applied;

        allocations.push(CreditAllocation {
            transaction_id: tx.id.clone(),
            sale_id: tx.sale_id.clone(),
            applied,
            fully_paid: tx.outstanding().is_zero(),
        });
    }

    CreditSettlement {
        allocations,
        remainder: left,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sale;
    use chrono::Utc;

    fn sale(id: &str) -> Sale {
        Sale {
            id: id.to_string(),
            event_id: "quermesse".to_string(),
            order_id: format!("order-{}", id),
            items: vec![],
            total: Money::zero(),
            payments: vec![],
            customer_id: Some("c1".to_string()),
            is_paid: false,
            is_refunded: false,
            created_at: Utc::now(),
            created_by: "ana".to_string(),
        }
    }

    fn purchase(sale_id: &str, cents: i64, paid: i64) -> CustomerTransaction {
        CustomerTransaction::purchase(
            "c1",
            &sale(sale_id),
            Money::from_cents(cents),
            Money::from_cents(paid),
            "ana",
        )
    }

    #[test]
    fn test_empty_ledger_is_initial_balance() {
        assert_eq!(derive_balance(Money::from_cents(-500), &[]).cents(), -500);
    }

    #[test]
    fn test_purchase_then_refund_nets_to_zero() {
        let s = sale("s1");
        let ledger = vec![
            CustomerTransaction::purchase("c1", &s, Money::from_cents(1000), Money::zero(), "ana"),
            CustomerTransaction::refund("c1", &s, Money::from_cents(1000), "ana"),
        ];
        assert_eq!(derive_balance(Money::zero(), &ledger[..1]).cents(), -1000);
        assert_eq!(derive_balance(Money::zero(), &ledger).cents(), 0);
    }

    #[test]
    fn test_partially_paid_purchase() {
        let ledger = vec![purchase("s1", 1000, 400)];
        assert_eq!(derive_balance(Money::zero(), &ledger).cents(), -600);
        assert_eq!(outstanding_debt(&ledger).cents(), 600);
    }

    #[test]
    fn test_settlement_pays_oldest_first() {
        let mut ledger = vec![
            purchase("s1", 500, 0),
            CustomerTransaction::deposit("c1", Money::from_cents(100), "ana"),
            purchase("s2", 800, 300),
        ];

        let result = apply_credit_settlement(&mut ledger, Money::from_cents(700));

        assert_eq!(result.allocations.len(), 2);
        assert_eq!(result.allocations[0].sale_id.as_deref(), Some("s1"));
        assert_eq!(result.allocations[0].applied.cents(), 500);
        assert!(result.allocations[0].fully_paid);
        assert_eq!(result.allocations[1].applied.cents(), 200);
        assert!(!result.allocations[1].fully_paid);
        assert_eq!(result.remainder, Money::zero());

        assert_eq!(ledger[0].amount_paid.cents(), 500);
        assert_eq!(ledger[1].amount_paid, Money::zero());
        assert_eq!(ledger[2].amount_paid.cents(), 500);
        assert_eq!(outstanding_debt(&ledger).cents(), 300);
    }

    #[test]
    fn test_settlement_returns_remainder() {
        let mut ledger = vec![purchase("s1", 500, 0)];
        let result = apply_credit_settlement(&mut ledger, Money::from_cents(800));

        assert_eq!(result.applied().cents(), 500);
        assert_eq!(result.remainder.cents(), 300);
        assert_eq!(ledger[0].amount_paid, ledger[0].amount);
    }

    #[test]
    fn test_refunded_purchase_is_not_debt() {
        let s1 = sale("s1");
        let mut ledger = vec![
            purchase("s1", 1000, 0),
            purchase("s2", 300, 0),
            CustomerTransaction::refund("c1", &s1, Money::from_cents(1000), "ana"),
        ];
        assert_eq!(derive_balance(Money::zero(), &ledger).cents(), -300);
        assert_eq!(outstanding_debt(&ledger).cents(), 300);

        let result = apply_credit_settlement(&mut ledger, Money::from_cents(1000));

        assert_eq!(result.allocations.len(), 1);
        assert_eq!(result.allocations[0].sale_id.as_deref(), Some("s2"));
        assert_eq!(result.remainder.cents(), 700);
        assert_eq!(ledger[0].amount_paid, Money::zero());
        assert_eq!(derive_balance(Money::zero(), &ledger), Money::zero());
    }

    #[test]
    fn test_ledger_volume() {
        let ledger = vec![
            CustomerTransaction::deposit("c1", Money::from_cents(2000), "ana"),
            purchase("s1", 500, 100),
        ];
        assert_eq!(ledger_volume(Money::from_cents(-300), &ledger), Some(Money::from_cents(2800)));

        let huge = vec![CustomerTransaction::deposit("c1", Money::from_cents(i64::MAX), "ana")];
        assert_eq!(ledger_volume(Money::from_cents(1), &huge), None);
        assert_eq!(ledger_volume(Money::from_cents(i64::MIN), &[]), None);
    }

    #[test]
    fn test_settlement_with_no_debt_touches_nothing() {
        let mut ledger = vec![purchase("s1", 500, 500)];
        let before = ledger.clone();
        let result = apply_credit_settlement(&mut ledger, Money::from_cents(100));

        assert!(result.allocations.is_empty());
        assert_eq!(result.remainder.cents(), 100);
        assert_eq!(ledger, before);
    }
}
