//! # Refunds
//!
//! Reverses a settled sale exactly once.
//!
//! ```text
//! refund(sale, reason)                         ── sale lock held throughout
//!   │
//!   ├─ already refunded?  ──► SaleAlreadyRefunded (nothing changes)
//!   ├─ blank reason?      ──► EmptyRefundReason   (nothing changes)
//!   ├─ customer / stock records still resolvable?
//!   │
//!   ├─ customer set?  ──► ledger += refund { amount: Σ credit parts }
//!   ├─ stock          ──► release(Refund) for every item: sold_count −= q
//!   └─ is_refunded = true
//! ```
//!
//! The refund entry gives back exactly the debt the sale created, no matter
//! how much of it was paid off since.

use std::sync::Arc;

use cantina_core::validation::{validate_refund_reason, validate_required};
use cantina_core::{CoreError, CustomerTransaction, RefundRecord};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, error, info};

use crate::collaborators::{AuditEntry, AuditSink};
use crate::error::{EngineError, EngineResult};
use crate::ledger::CustomerLedger;
use crate::sales::SaleBook;
use crate::stock::{ReleaseMode, StockLedger};

pub struct RefundProcessor {
    stock: Arc<StockLedger>,
    ledger: Arc<CustomerLedger>,
    sales: Arc<SaleBook>,
    audit: Arc<dyn AuditSink>,
}

impl RefundProcessor {
    pub fn new(
        stock: Arc<StockLedger>,
        ledger: Arc<CustomerLedger>,
        sales: Arc<SaleBook>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        RefundProcessor {
            stock,
            ledger,
            sales,
            audit,
        }
    }

    pub fn refund(&self, sale_id: &str, reason: &str, staff_id: &str) -> EngineResult<RefundRecord> {
        debug!(sale_id, staff_id, "Refunding sale");
        let handle = self.sales.handle(sale_id)?;
        let mut sale = handle.lock();

        if sale.is_refunded {
            return Err(CoreError::SaleAlreadyRefunded {
                sale_id: sale_id.to_string(),
            }
            .into());
        }
        let reason = validate_refund_reason(reason)?;
        validate_required("staff id", staff_id)?;

        // Resolve everything that can fail before the first write.
        if let Some(ref customer) = sale.customer_id {
            self.ledger.ensure_customer(customer)?;
        }
        let lines: Vec<(String, i64)> = sale
            .items
            .iter()
            .map(|l| (l.menu_item_id.clone(), l.quantity))
            .collect();
        let ids: Vec<&str> = lines.iter().map(|(id, _)| id.as_str()).collect();
        self.stock.preload(&ids)?;

        let credit = sale.credit_amount();
        let ledger_entry_id = match sale.customer_id {
            Some(ref customer) => {
                let tx = CustomerTransaction::refund(customer, &sale, credit, staff_id);
                Some(self.ledger.record(tx)?.id)
            }
            None => None,
        };

        if let Err(e) = self.stock.release_all(&lines, ReleaseMode::Refund) {
            error!(sale_id, error = %e, "Stock release failed after refund entry was written");
            return Err(EngineError::invariant(
                "refund",
                format!("stock release failed after ledger write: {}", e),
            ));
        }

        sale.is_refunded = true;

        info!(sale_id, credit = %credit, items = lines.len(), %reason, "Sale refunded");
        self.audit.record(
            AuditEntry::new(
                "sale",
                sale_id,
                "refund",
                json!({ "isRefunded": true, "reason": reason }),
                staff_id,
            )
            .with_previous(json!({ "isRefunded": false })),
        );

        Ok(RefundRecord {
            sale_id: sale.id.clone(),
            order_id: sale.order_id.clone(),
            reason,
            refunded_by: staff_id.to_string(),
            refunded_at: Utc::now(),
            restocked: sale.items.clone(),
            credit_restored: credit,
            ledger_entry_id,
        })
    }
}

impl std::fmt::Debug for RefundProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefundProcessor").finish_non_exhaustive()
    }
}
