//! # Customer Ledger
//!
//! Append-only, per-customer book of typed transactions. The balance is
//! never stored; every read re-derives it from the book.
//!
//! ## Locking
//! ```text
//! books: DashMap<customer_id, Arc<RwLock<Vec<CustomerTransaction>>>>
//!
//!   record()             ── write lock ── push
//!   settle_outstanding() ── write lock ── bump purchase.amount_paid
//!   balance_of()         ── read lock  ── derive (consistent snapshot)
//!   history_of()         ── read lock  ── clone, then filter lazily
//! ```
//!
//! Customers never share a lock, so one customer's traffic cannot leak into
//! another customer's reads.

use std::sync::Arc;

use cantina_core::balance::{apply_credit_settlement, derive_balance, ledger_volume, outstanding_debt};
use cantina_core::validation::{validate_positive_amount, validate_required};
use cantina_core::{
    CoreError, CoreResult, CreditSettlement, CustomerAccount, CustomerTransaction, EntryTags,
    HistoryFilter, Money, TransactionType, ValidationError,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::collaborators::{audit_value, AuditEntry, AuditSink, CustomerDirectory};

type Book = Arc<RwLock<Vec<CustomerTransaction>>>;

pub struct CustomerLedger {
    customers: Arc<dyn CustomerDirectory>,
    audit: Arc<dyn AuditSink>,
    books: DashMap<String, Book>,
}

impl CustomerLedger {
    pub fn new(customers: Arc<dyn CustomerDirectory>, audit: Arc<dyn AuditSink>) -> Self {
        CustomerLedger {
            customers,
            audit,
            books: DashMap::new(),
        }
    }

    /// Looks the customer up in the directory.
    pub fn ensure_customer(&self, customer_id: &str) -> CoreResult<CustomerAccount> {
        self.customers
            .customer(customer_id)
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))
    }

    fn book(&self, customer_id: &str) -> Book {
        if let Some(book) = self.books.get(customer_id) {
            return Arc::clone(book.value());
        }
        Arc::clone(
            self.books
                .entry(customer_id.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(Vec::new())))
                .value(),
        )
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Appends an entry to the customer's book.
    ///
    /// Prior entries are never touched. The entry is checked for a known
    /// customer, a non-negative amount, and (for purchases)
    /// `0 <= amount_paid <= amount`. Entries that would push the book past
    /// what an i64 balance can hold are refused.
    pub fn record(&self, tx: CustomerTransaction) -> CoreResult<CustomerTransaction> {
        debug!(customer_id = %tx.customer_id, kind = %tx.kind, amount = %tx.amount, "Recording ledger entry");

        let account = self.ensure_customer(&tx.customer_id)?;
        validate_required("created by", &tx.created_by)?;
        if tx.amount.is_negative() {
            return Err(ValidationError::OutOfRange {
                field: "amount".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        if tx.kind == TransactionType::Purchase
            && (tx.amount_paid.is_negative() || tx.amount_paid > tx.amount)
        {
            return Err(ValidationError::OutOfRange {
                field: "amount paid".to_string(),
                min: 0,
                max: tx.amount.cents(),
            }
            .into());
        }

        let book = self.book(&tx.customer_id);
        {
            let mut entries = book.write();
            let fits = ledger_volume(account.initial_balance, &entries)
                .and_then(|volume| volume.checked_add(tx.amount))
                .is_some();
            if !fits {
                warn!(customer_id = %tx.customer_id, amount = %tx.amount, "Ledger entry would overflow balance");
                return Err(ValidationError::OutOfRange {
                    field: "customer balance".to_string(),
                    min: i64::MIN,
                    max: i64::MAX,
                }
                .into());
            }
            entries.push(tx.clone());
        }

        self.audit.record(AuditEntry::new(
            "customer_transaction",
            tx.id.clone(),
            tx.kind.as_str(),
            audit_value(&tx),
            tx.created_by.clone(),
        ));

        Ok(tx)
    }

    /// Records money handed over by the customer.
    pub fn deposit(
        &self,
        customer_id: &str,
        amount: Money,
        staff_id: &str,
        tags: EntryTags,
    ) -> CoreResult<CustomerTransaction> {
        validate_positive_amount("deposit amount", amount)?;
        let tx = self.record(
            CustomerTransaction::deposit(customer_id, amount, staff_id).with_tags(tags),
        )?;
        info!(customer_id, amount = %amount, "Deposit recorded");
        Ok(tx)
    }

    /// Records money handed back to the customer.
    pub fn withdraw(
        &self,
        customer_id: &str,
        amount: Money,
        staff_id: &str,
        tags: EntryTags,
    ) -> CoreResult<CustomerTransaction> {
        validate_positive_amount("withdrawal amount", amount)?;
        let tx = self.record(
            CustomerTransaction::withdrawal(customer_id, amount, staff_id).with_tags(tags),
        )?;
        info!(customer_id, amount = %amount, "Withdrawal recorded");
        Ok(tx)
    }

    /// Applies a payment to the customer's unpaid purchases, oldest first.
    ///
    /// This is the one place an existing entry changes: purchase
    /// `amount_paid` grows, never past `amount`. Flipping `is_paid` on the
    /// matching sales is the caller's job.
    pub fn settle_outstanding(
        &self,
        customer_id: &str,
        amount: Money,
        staff_id: &str,
    ) -> CoreResult<CreditSettlement> {
        validate_positive_amount("settlement amount", amount)?;
        validate_required("staff id", staff_id)?;
        self.ensure_customer(customer_id)?;

        let book = self.book(customer_id);
        let settlement = {
            let mut entries = book.write();
            apply_credit_settlement(&mut entries, amount)
        };

        info!(
            customer_id,
            applied = %settlement.applied(),
            remainder = %settlement.remainder,
            purchases = settlement.allocations.len(),
            "Outstanding credit settled"
        );
        self.audit.record(AuditEntry::new(
            "customer",
            customer_id,
            "settle_outstanding",
            audit_value(&settlement),
            staff_id,
        ));

        Ok(settlement)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current balance: initial balance plus the effect of every entry.
    pub fn balance_of(&self, customer_id: &str) -> CoreResult<Money> {
        let account = self.ensure_customer(customer_id)?;
        let book = self.book(customer_id);
        let entries = book.read();
        Ok(derive_balance(account.initial_balance, &entries))
    }

    /// Σ unpaid purchase debt.
    pub fn outstanding_of(&self, customer_id: &str) -> CoreResult<Money> {
        self.ensure_customer(customer_id)?;
        let book = self.book(customer_id);
        let entries = book.read();
        Ok(outstanding_debt(&entries))
    }

    /// Snapshot of the book, filtered lazily on iteration.
    pub fn history_of(
        &self,
        customer_id: &str,
        filter: Option<HistoryFilter>,
    ) -> CoreResult<LedgerHistory> {
        self.ensure_customer(customer_id)?;
        let book = self.book(customer_id);
        let entries: Arc<[CustomerTransaction]> = book.read().as_slice().into();
        Ok(LedgerHistory {
            entries,
            filter: filter.unwrap_or_default(),
        })
    }
}

impl std::fmt::Debug for CustomerLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomerLedger")
            .field("books", &self.books.len())
            .finish()
    }
}

// =============================================================================
// History
// =============================================================================

/// A point-in-time copy of one customer's book.
///
/// `iter()` may be called any number of times; each call starts over.
/// Entries appended after the snapshot was taken are not seen.
#[derive(Debug, Clone)]
pub struct LedgerHistory {
    entries: Arc<[CustomerTransaction]>,
    filter: HistoryFilter,
}

impl LedgerHistory {
    pub fn iter(&self) -> impl Iterator<Item = &CustomerTransaction> + '_ {
        self.entries.iter().filter(move |tx| self.filter.matches(tx))
    }

    pub fn filter(&self) -> &HistoryFilter {
        &self.filter
    }

    pub fn to_vec(&self) -> Vec<CustomerTransaction> {
        self.iter().cloned().collect()
    }
}

impl<'a> IntoIterator for &'a LedgerHistory {
    type Item = &'a CustomerTransaction;
    type IntoIter = Box<dyn Iterator<Item = &'a CustomerTransaction> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
