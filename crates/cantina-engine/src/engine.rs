//! # Cantina Engine
//!
//! One handle over every component, the way the handler layer sees it.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           CantinaEngine                                 │
//! │                                                                         │
//! │   create_order / add_or_set_line / remove_line / cancel_order           │
//! │        │                                                                │
//! │        ▼                                                                │
//! │   CartRegistry ─────────────┐                                           │
//! │        │                    ▼                                           │
//! │   SettlementEngine ───► StockLedger ◄─── RefundProcessor                │
//! │        │                                        │                       │
//! │        ├──────────► CustomerLedger ◄────────────┤                       │
//! │        └──────────► SaleBook ◄──────────────────┘                       │
//! │                                                                         │
//! │   MenuCatalog, CustomerDirectory, AuditSink: supplied by the embedder   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use cantina_core::{
    CartLine, CoreError, CreditSettlement, CustomerTransaction, EntryTags, HistoryFilter,
    LineUpdate, Money, OrderCart, PaymentPart, RefundRecord, Sale,
};
use tracing::{debug, info};

use crate::cart::CartRegistry;
use crate::collaborators::{AuditSink, CustomerDirectory, MenuCatalog, TracingAuditSink};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::ledger::{CustomerLedger, LedgerHistory};
use crate::refund::RefundProcessor;
use crate::sales::SaleBook;
use crate::settlement::SettlementEngine;
use crate::stock::{StockLedger, StockLevel};

pub struct CantinaEngine {
    config: EngineConfig,
    stock: Arc<StockLedger>,
    carts: Arc<CartRegistry>,
    ledger: Arc<CustomerLedger>,
    sales: Arc<SaleBook>,
    settlement: SettlementEngine,
    refunds: RefundProcessor,
}

impl CantinaEngine {
    /// Wires every component from a validated config and the collaborators.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn MenuCatalog>,
        customers: Arc<dyn CustomerDirectory>,
        audit: Arc<dyn AuditSink>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let stock = Arc::new(StockLedger::new(catalog.clone()));
        let carts = Arc::new(CartRegistry::new(
            stock.clone(),
            catalog,
            audit.clone(),
            &config.settlement,
        ));
        let ledger = Arc::new(CustomerLedger::new(customers, audit.clone()));
        let sales = Arc::new(SaleBook::new());
        let settlement = SettlementEngine::new(
            carts.clone(),
            stock.clone(),
            ledger.clone(),
            sales.clone(),
            audit.clone(),
            config.settlement.payment_tolerance(),
        );
        let refunds = RefundProcessor::new(stock.clone(), ledger.clone(), sales.clone(), audit);

        info!(
            tolerance = %config.settlement.payment_tolerance(),
            max_cart_lines = config.settlement.max_cart_lines,
            max_line_quantity = config.settlement.max_line_quantity,
            "Cantina engine ready"
        );

        Ok(CantinaEngine {
            config,
            stock,
            carts,
            ledger,
            sales,
            settlement,
            refunds,
        })
    }

    /// Default config, audit entries written to tracing.
    pub fn with_defaults(
        catalog: Arc<dyn MenuCatalog>,
        customers: Arc<dyn CustomerDirectory>,
    ) -> EngineResult<Self> {
        Self::new(
            EngineConfig::default(),
            catalog,
            customers,
            Arc::new(TracingAuditSink),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Orders
    // =========================================================================

    pub fn create_order(&self, event_id: &str, staff_id: &str) -> EngineResult<OrderCart> {
        Ok(self.carts.create(event_id, staff_id)?)
    }

    pub fn add_or_set_line(
        &self,
        order_id: &str,
        menu_item_id: &str,
        quantity: i64,
    ) -> EngineResult<LineUpdate> {
        Ok(self.carts.add_or_set_line(order_id, menu_item_id, quantity)?)
    }

    pub fn remove_line(&self, order_id: &str, menu_item_id: &str) -> EngineResult<CartLine> {
        Ok(self.carts.remove_line(order_id, menu_item_id)?)
    }

    pub fn cancel_order(&self, order_id: &str, staff_id: &str) -> EngineResult<OrderCart> {
        Ok(self.carts.cancel(order_id, staff_id)?)
    }

    pub fn order(&self, order_id: &str) -> EngineResult<OrderCart> {
        Ok(self.carts.get(order_id)?)
    }

    pub fn order_total(&self, order_id: &str) -> EngineResult<Money> {
        Ok(self.carts.total(order_id)?)
    }

    // =========================================================================
    // Settlement & Refunds
    // =========================================================================

    pub fn confirm(
        &self,
        order_id: &str,
        payments: &[PaymentPart],
        staff_id: &str,
        customer_id: Option<&str>,
    ) -> EngineResult<Sale> {
        self.settlement
            .confirm(order_id, payments, staff_id, customer_id)
    }

    pub fn refund(&self, sale_id: &str, reason: &str, staff_id: &str) -> EngineResult<RefundRecord> {
        self.refunds.refund(sale_id, reason, staff_id)
    }

    pub fn sale(&self, sale_id: &str) -> EngineResult<Sale> {
        Ok(self.sales.get(sale_id)?)
    }

    /// Sales of an event, oldest first.
    pub fn sales_for_event(&self, event_id: &str) -> Vec<Sale> {
        self.sales.for_event(event_id)
    }

    // =========================================================================
    // Customers
    // =========================================================================

    pub fn balance_of(&self, customer_id: &str) -> EngineResult<Money> {
        Ok(self.ledger.balance_of(customer_id)?)
    }

    pub fn outstanding_of(&self, customer_id: &str) -> EngineResult<Money> {
        Ok(self.ledger.outstanding_of(customer_id)?)
    }

    pub fn history_of(
        &self,
        customer_id: &str,
        filter: Option<HistoryFilter>,
    ) -> EngineResult<LedgerHistory> {
        Ok(self.ledger.history_of(customer_id, filter)?)
    }

    pub fn deposit(
        &self,
        customer_id: &str,
        amount: Money,
        staff_id: &str,
        tags: EntryTags,
    ) -> EngineResult<CustomerTransaction> {
        Ok(self.ledger.deposit(customer_id, amount, staff_id, tags)?)
    }

    pub fn withdraw(
        &self,
        customer_id: &str,
        amount: Money,
        staff_id: &str,
        tags: EntryTags,
    ) -> EngineResult<CustomerTransaction> {
        Ok(self.ledger.withdraw(customer_id, amount, staff_id, tags)?)
    }

    /// Pays down outstanding credit and marks the sales it clears as paid.
    pub fn settle_outstanding(
        &self,
        customer_id: &str,
        amount: Money,
        staff_id: &str,
    ) -> EngineResult<CreditSettlement> {
        let settlement = self.ledger.settle_outstanding(customer_id, amount, staff_id)?;

        for sale_id in settlement
            .allocations
            .iter()
            .filter(|a| a.fully_paid)
            .filter_map(|a| a.sale_id.as_deref())
        {
            match self.sales.mark_paid(sale_id) {
                Ok(_) => {}
                // Purchases recorded straight into the ledger have no sale here.
                Err(CoreError::SaleNotFound(_)) => {
                    debug!(sale_id, "Settled purchase has no stored sale");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(settlement)
    }

    // =========================================================================
    // Stock
    // =========================================================================

    pub fn stock_level(&self, menu_item_id: &str) -> EngineResult<StockLevel> {
        Ok(self.stock.snapshot(menu_item_id)?)
    }
}

impl std::fmt::Debug for CantinaEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CantinaEngine")
            .field("config", &self.config)
            .field("stock", &self.stock)
            .field("carts", &self.carts)
            .field("ledger", &self.ledger)
            .field("sales", &self.sales.len())
            .finish()
    }
}
