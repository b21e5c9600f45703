//! # Settlement
//!
//! The boundary between "draft" and "money has moved".
//!
//! ## Confirmation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      confirm(order, payments)                           │
//! │                                                                         │
//! │  ── cart lock held from here ─────────────────────────────────────────  │
//! │                                                                         │
//! │  1. cart open? has lines?           ──► OrderNotPending / OrderEmpty    │
//! │  2. payments present and > 0?       ──► NoPayment / InvalidPaymentAmount│
//! │  3. |Σ payments − total| ≤ tol?     ──► PaymentMismatch                 │
//! │  4. credit used ⇒ customer given?   ──► CustomerRequiredForCredit       │
//! │     customer known?                 ──► CustomerNotFound                │
//! │        (all of the above: nothing changed, caller may retry)            │
//! │                                                                         │
//! │  5. commit stock for every line     ──► Invariant (fatal)               │
//! │  6. credit > 0 ⇒ record purchase    ──► on failure undo step 5          │
//! │  7. cart → Confirmed                                                    │
//! │  8. store Sale, audit                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use cantina_core::validation::{validate_payments, validate_required};
use cantina_core::{
    new_id, CoreError, CustomerTransaction, Money, OrderStatus, PaymentPart, Sale,
};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::cart::{total_overflow, CartRegistry};
use crate::collaborators::{audit_value, AuditEntry, AuditSink};
use crate::error::{EngineError, EngineResult};
use crate::ledger::CustomerLedger;
use crate::sales::SaleBook;
use crate::stock::StockLedger;

pub struct SettlementEngine {
    carts: Arc<CartRegistry>,
    stock: Arc<StockLedger>,
    ledger: Arc<CustomerLedger>,
    sales: Arc<SaleBook>,
    audit: Arc<dyn AuditSink>,
    tolerance: Money,
}

impl SettlementEngine {
    pub fn new(
        carts: Arc<CartRegistry>,
        stock: Arc<StockLedger>,
        ledger: Arc<CustomerLedger>,
        sales: Arc<SaleBook>,
        audit: Arc<dyn AuditSink>,
        tolerance: Money,
    ) -> Self {
        SettlementEngine {
            carts,
            stock,
            ledger,
            sales,
            audit,
            tolerance,
        }
    }

    /// Turns an open cart into a sale.
    ///
    /// Either every effect lands (stock committed, purchase recorded, cart
    /// confirmed, sale stored) or none does.
    pub fn confirm(
        &self,
        order_id: &str,
        payments: &[PaymentPart],
        staff_id: &str,
        customer_id: Option<&str>,
    ) -> EngineResult<Sale> {
        debug!(order_id, parts = payments.len(), ?customer_id, "Confirming order");
        validate_required("staff id", staff_id)?;

        let customer_id = customer_id
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let handle = self.carts.handle(order_id)?;
        let mut cart = handle.lock();

        // Steps 1-4: pure validation
        cart.ensure_open()?;
        if cart.is_empty() {
            return Err(CoreError::OrderEmpty {
                order_id: order_id.to_string(),
            }
            .into());
        }

        let total = cart.checked_total().ok_or_else(total_overflow)?;
        let summary = match validate_payments(payments, total, customer_id.as_deref(), self.tolerance)
        {
            Ok(summary) => summary,
            Err(e) => {
                warn!(order_id, error = %e, "Payment set rejected");
                return Err(e.into());
            }
        };

        if let Some(ref customer) = customer_id {
            self.ledger.ensure_customer(customer)?;
        }

        // Step 5: stock
        let lines: Vec<(String, i64)> = cart
            .lines
            .iter()
            .map(|l| (l.menu_item_id.clone(), l.quantity))
            .collect();
        if let Err(e) = self.stock.commit_all(&lines) {
            error!(order_id, error = %e, "Stock commit failed, aborting confirmation");
            return Err(e);
        }

        let mut sale = Sale {
            id: new_id(),
            event_id: cart.event_id.clone(),
            order_id: cart.id.clone(),
            items: cart.lines.clone(),
            total,
            payments: payments.to_vec(),
            customer_id: customer_id.clone(),
            is_paid: true,
            is_refunded: false,
            created_at: Utc::now(),
            created_by: staff_id.to_string(),
        };

        // Step 6: customer ledger
        if summary.credit.is_positive() {
            let customer = customer_id.as_deref().unwrap_or_default();
            let covered = summary.credit_covered();
            let purchase =
                CustomerTransaction::purchase(customer, &sale, summary.credit, covered, staff_id);

            if let Err(e) = self.ledger.record(purchase) {
                error!(order_id, error = %e, "Ledger write failed, rolling back stock");
                if let Err(rollback) = self.stock.rollback_commit(&lines) {
                    return Err(EngineError::invariant(
                        "confirm",
                        format!("ledger write failed ({}) and stock rollback failed ({})", e, rollback),
                    ));
                }
                return Err(e.into());
            }
            sale.is_paid = covered >= summary.credit;
        }

        // Steps 7-8
        cart.transition_to(OrderStatus::Confirmed)?;
        self.sales.insert(sale.clone());

        info!(
            order_id,
            sale_id = %sale.id,
            total = %sale.total,
            credit = %summary.credit,
            is_paid = sale.is_paid,
            "Sale confirmed"
        );
        self.audit.record(AuditEntry::new(
            "sale",
            sale.id.clone(),
            "confirm",
            audit_value(&sale),
            staff_id,
        ));

        Ok(sale)
    }
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{InMemoryCatalog, InMemoryCustomers, MemoryAuditSink, MenuCatalog};
    use crate::config::SettlementSettings;
    use cantina_core::{CustomerAccount, ErrorCode, MenuItem, PaymentMethod};

    struct Fixture {
        carts: Arc<CartRegistry>,
        stock: Arc<StockLedger>,
        ledger: Arc<CustomerLedger>,
        sales: Arc<SaleBook>,
        engine: SettlementEngine,
    }

    fn fixture() -> Fixture {
        let catalog: Arc<dyn MenuCatalog> = Arc::new(InMemoryCatalog::with_items([
            MenuItem {
                id: "pastel".into(),
                event_id: "festa".into(),
                name: "Pastel".into(),
                price: Money::from_cents(500),
                capacity: 10,
                sold_count: 0,
            },
        ]));
        let customers = Arc::new(InMemoryCustomers::with_accounts([CustomerAccount {
            id: "maria".into(),
            name: "Dona Maria".into(),
            initial_balance: Money::zero(),
        }]));
        let audit: Arc<dyn AuditSink> = Arc::new(MemoryAuditSink::new());

        let stock = Arc::new(StockLedger::new(catalog.clone()));
        let carts = Arc::new(CartRegistry::new(
            stock.clone(),
            catalog,
            audit.clone(),
            &SettlementSettings::default(),
        ));
        let ledger = Arc::new(CustomerLedger::new(customers, audit.clone()));
        let sales = Arc::new(SaleBook::new());
        let engine = SettlementEngine::new(
            carts.clone(),
            stock.clone(),
            ledger.clone(),
            sales.clone(),
            audit,
            Money::from_cents(1),
        );
        Fixture {
            carts,
            stock,
            ledger,
            sales,
            engine,
        }
    }

    fn pay(method: PaymentMethod, cents: i64) -> PaymentPart {
        PaymentPart::new(method, Money::from_cents(cents))
    }

    fn open_cart(f: &Fixture, quantity: i64) -> String {
        let cart = f.carts.create("festa", "ana").unwrap();
        f.carts.add_or_set_line(&cart.id, "pastel", quantity).unwrap();
        cart.id
    }

    #[test]
    fn test_cash_sale() {
        let f = fixture();
        let order = open_cart(&f, 2);

        let sale = f
            .engine
            .confirm(&order, &[pay(PaymentMethod::Cash, 1000)], "ana", None)
            .unwrap();

        assert!(sale.is_paid);
        assert_eq!(sale.total.cents(), 1000);
        assert_eq!(f.carts.get(&order).unwrap().status, OrderStatus::Confirmed);
        let level = f.stock.snapshot("pastel").unwrap();
        assert_eq!((level.sold_count, level.reserved), (2, 0));
        assert_eq!(f.sales.get(&sale.id).unwrap().order_id, order);
    }

    #[test]
    fn test_validation_failure_changes_nothing() {
        let f = fixture();
        let order = open_cart(&f, 2);

        let err = f
            .engine
            .confirm(&order, &[pay(PaymentMethod::Cash, 900)], "ana", None)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::PaymentMismatch);
        assert!(!err.is_fatal());

        assert_eq!(f.carts.get(&order).unwrap().status, OrderStatus::Open);
        assert_eq!(f.stock.snapshot("pastel").unwrap().reserved, 2);
        assert!(f.sales.is_empty());
    }

    #[test]
    fn test_overflowing_payments_are_rejected() {
        let f = fixture();
        let order = open_cart(&f, 2);

        let err = f
            .engine
            .confirm(
                &order,
                &[pay(PaymentMethod::Cash, i64::MAX), pay(PaymentMethod::Card, i64::MAX)],
                "ana",
                None,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidPaymentAmount);
        assert!(!err.is_fatal());

        assert_eq!(f.carts.get(&order).unwrap().status, OrderStatus::Open);
        assert_eq!(f.stock.snapshot("pastel").unwrap().sold_count, 0);
        assert!(f.sales.is_empty());
    }

    #[test]
    fn test_empty_cart() {
        let f = fixture();
        let cart = f.carts.create("festa", "ana").unwrap();
        let err = f
            .engine
            .confirm(&cart.id, &[pay(PaymentMethod::Cash, 100)], "ana", None)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderEmpty);
    }

    #[test]
    fn test_confirm_twice() {
        let f = fixture();
        let order = open_cart(&f, 1);
        f.engine
            .confirm(&order, &[pay(PaymentMethod::Card, 500)], "ana", None)
            .unwrap();
        let err = f
            .engine
            .confirm(&order, &[pay(PaymentMethod::Card, 500)], "ana", None)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::OrderNotPending);
        assert_eq!(f.stock.snapshot("pastel").unwrap().sold_count, 1);
    }

    #[test]
    fn test_credit_creates_purchase() {
        let f = fixture();
        let order = open_cart(&f, 2);

        let sale = f
            .engine
            .confirm(
                &order,
                &[pay(PaymentMethod::Cash, 400), pay(PaymentMethod::Credit, 600)],
                "ana",
                Some("maria"),
            )
            .unwrap();

        assert!(!sale.is_paid);
        assert_eq!(f.ledger.balance_of("maria").unwrap().cents(), -600);
        let history = f.ledger.history_of("maria", None).unwrap().to_vec();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sale_id.as_deref(), Some(sale.id.as_str()));
    }

    #[test]
    fn test_balance_covers_credit() {
        let f = fixture();
        let order = open_cart(&f, 2);

        let sale = f
            .engine
            .confirm(
                &order,
                &[pay(PaymentMethod::Credit, 500), pay(PaymentMethod::Balance, 500)],
                "ana",
                Some("maria"),
            )
            .unwrap();

        assert!(sale.is_paid);
        let history = f.ledger.history_of("maria", None).unwrap().to_vec();
        assert_eq!(history[0].amount.cents(), 500);
        assert_eq!(history[0].amount_paid.cents(), 500);
        assert_eq!(f.ledger.balance_of("maria").unwrap(), Money::zero());
    }

    #[test]
    fn test_unknown_customer_rejected_before_commit() {
        let f = fixture();
        let order = open_cart(&f, 1);

        let err = f
            .engine
            .confirm(&order, &[pay(PaymentMethod::Credit, 500)], "ana", Some("ghost"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        let level = f.stock.snapshot("pastel").unwrap();
        assert_eq!((level.sold_count, level.reserved), (0, 1));
    }

    #[test]
    fn test_lost_reservation_is_fatal() {
        let f = fixture();
        let order = open_cart(&f, 2);
        f.stock.reserve("pastel", -2).unwrap();

        let err = f
            .engine
            .confirm(&order, &[pay(PaymentMethod::Cash, 1000)], "ana", None)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(f.carts.get(&order).unwrap().status, OrderStatus::Open);
        assert!(f.sales.is_empty());
        assert_eq!(f.stock.snapshot("pastel").unwrap().sold_count, 0);
    }
}
