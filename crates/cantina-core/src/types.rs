//! # Domain Types
//!
//! Core domain types used throughout Cantina POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    MenuItem     │   │   OrderCart     │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id, event_id   │──►│  status         │──►│  items (frozen) │       │
//! │  │  price          │   │  lines          │   │  payments       │       │
//! │  │  capacity       │   │  (CartLine)     │   │  is_paid        │       │
//! │  │  sold_count     │   │                 │   │  is_refunded    │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │ credit used    │
//! │  ┌─────────────────┐   ┌──────────────────────────────▼──────────┐     │
//! │  │ CustomerAccount │◄──│ CustomerTransaction (append-only)       │     │
//! │  │  initial_balance│   │  deposit | withdrawal | purchase | refund│    │
//! │  └─────────────────┘   └─────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! A `CartLine` freezes the menu item's description and price when the line
//! is first added. A `Sale` freezes the cart lines at confirmation time.
//! Later catalog edits never change what a customer was charged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

/// Generates a fresh entity id (UUID v4).
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// =============================================================================
// Menu Item
// =============================================================================

/// A menu item as seen by the settlement engine.
///
/// Owned by the catalog; the engine only reads it when a stock record is
/// first touched. `capacity == 0` means unlimited stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MenuItem {
    pub id: String,
    /// Event this item is sold at.
    pub event_id: String,
    /// Display name, frozen into cart lines.
    pub name: String,
    pub price: Money,
    /// Total units available for the event. 0 = unlimited.
    pub capacity: i64,
    /// Units already sold in confirmed sales.
    pub sold_count: i64,
}

impl MenuItem {
    /// True when the item has no stock ceiling.
    #[inline]
    pub fn is_unlimited(&self) -> bool {
        self.capacity == 0
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle of an order cart.
///
/// ```text
///            confirm()
///   Open ──────────────► Confirmed   (terminal)
///     │
///     │ cancel()
///     └────────────────► Cancelled   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum OrderStatus {
    #[default]
    Open,
    Confirmed,
    Cancelled,
}

impl OrderStatus {
    /// Whether the transition `self → next` is allowed.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        match (self, next) {
            (OrderStatus::Open, OrderStatus::Confirmed) => true,
            (OrderStatus::Open, OrderStatus::Cancelled) => true,
            (OrderStatus::Open, OrderStatus::Open) => false,
            (OrderStatus::Confirmed, _) => false,
            (OrderStatus::Cancelled, _) => false,
        }
    }

    /// True for `Confirmed` and `Cancelled`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Cart Line
// =============================================================================

/// One line of a cart (and, once confirmed, of a sale).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartLine {
    pub menu_item_id: String,
    /// Item name at time of adding (frozen).
    pub description: String,
    /// Unit price at time of adding (frozen).
    pub unit_price: Money,
    /// Always > 0; a zero-quantity line is removed instead.
    pub quantity: i64,
}

impl CartLine {
    /// Creates a line from a menu item, freezing its name and price.
    pub fn from_menu_item(item: &MenuItem, quantity: i64) -> Self {
        CartLine {
            menu_item_id: item.id.clone(),
            description: item.name.clone(),
            unit_price: item.price,
            quantity,
        }
    }

    /// Unit price × quantity.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    /// Unit price × quantity, `None` on overflow.
    #[inline]
    pub fn checked_line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Order Cart
// =============================================================================

/// A draft order being built by a staff member.
///
/// This type only holds data and enforces the status machine. Stock
/// reservations are the engine's business; see `cantina_engine::cart`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderCart {
    pub id: String,
    pub event_id: String,
    pub status: OrderStatus,
    /// Lines in insertion order, unique by `menu_item_id`.
    pub lines: Vec<CartLine>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl OrderCart {
    /// Creates an empty, open cart for an event.
    pub fn new(event_id: impl Into<String>, created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        OrderCart {
            id: new_id(),
            event_id: event_id.into(),
            status: OrderStatus::Open,
            lines: Vec::new(),
            created_by: created_by.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fails with `OrderNotPending` unless the cart is open.
    pub fn ensure_open(&self) -> CoreResult<()> {
        if self.status == OrderStatus::Open {
            Ok(())
        } else {
            Err(CoreError::OrderNotPending {
                order_id: self.id.clone(),
                status: self.status,
            })
        }
    }

    /// Returns the line for a menu item, if present.
    pub fn line(&self, menu_item_id: &str) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.menu_item_id == menu_item_id)
    }

    /// Quantity currently held for a menu item (0 if absent).
    pub fn quantity_of(&self, menu_item_id: &str) -> i64 {
        self.line(menu_item_id).map(|l| l.quantity).unwrap_or(0)
    }

    /// Sets a line's quantity; `quantity <= 0` removes the line.
    ///
    /// An existing line keeps its frozen description and price.
    pub fn set_line(&mut self, item: &MenuItem, quantity: i64) {
        if quantity <= 0 {
            self.remove_line(&item.id);
            return;
        }

        match self.lines.iter_mut().find(|l| l.menu_item_id == item.id) {
            Some(line) => line.quantity = quantity,
            None => self.lines.push(CartLine::from_menu_item(item, quantity)),
        }
        self.updated_at = Utc::now();
    }

    /// Removes and returns a line.
    pub fn remove_line(&mut self, menu_item_id: &str) -> Option<CartLine> {
        let idx = self
            .lines
            .iter()
            .position(|l| l.menu_item_id == menu_item_id)?;
        self.updated_at = Utc::now();
        Some(self.lines.remove(idx))
    }

    /// Σ unit_price × quantity over current lines.
    ///
    /// Carts built through the engine never overflow; see
    /// [`OrderCart::checked_total_with`].
    pub fn total(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Σ unit_price × quantity, `None` if it does not fit in an i64.
    pub fn checked_total(&self) -> Option<Money> {
        self.lines
            .iter()
            .try_fold(Money::zero(), |acc, l| acc.checked_add(l.checked_line_total()?))
    }

    /// The total the cart would have with `item` set to `quantity`.
    ///
    /// An existing line is priced at its frozen unit price. `None` on
    /// overflow.
    pub fn checked_total_with(&self, item: &MenuItem, quantity: i64) -> Option<Money> {
        let unit_price = self.line(&item.id).map(|l| l.unit_price).unwrap_or(item.price);
        let others = self
            .lines
            .iter()
            .filter(|l| l.menu_item_id != item.id)
            .try_fold(Money::zero(), |acc, l| acc.checked_add(l.checked_line_total()?))?;
        others.checked_add(unit_price.checked_multiply_quantity(quantity.max(0))?)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Moves the cart to `next`, enforcing the status machine.
    pub fn transition_to(&mut self, next: OrderStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::OrderNotPending {
                order_id: self.id.clone(),
                status: self.status,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

// =============================================================================
// Payment Method / Payment Part
// =============================================================================

/// How (part of) a sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    /// Deferred payment ("fiado"); creates customer debt.
    Credit,
    /// Paid from the customer's previously deposited funds.
    Balance,
    Gift,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Credit => "credit",
            PaymentMethod::Balance => "balance",
            PaymentMethod::Gift => "gift",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" | "pix" => Ok(PaymentMethod::Transfer),
            "credit" | "fiado" => Ok(PaymentMethod::Credit),
            "balance" => Ok(PaymentMethod::Balance),
            "gift" => Ok(PaymentMethod::Gift),
            _ => Err(ValidationError::NotAllowed {
                field: "payment method".to_string(),
                allowed: ["cash", "card", "transfer", "credit", "balance", "gift"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            }),
        }
    }
}

/// One tender towards a sale. A sale may be split across several parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PaymentPart {
    pub method: PaymentMethod,
    /// Must be > 0.
    pub amount: Money,
}

impl PaymentPart {
    pub fn new(method: PaymentMethod, amount: Money) -> Self {
        PaymentPart { method, amount }
    }
}

/// Totals of a payment set, by the methods the ledger cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaymentSummary {
    /// Σ all parts.
    pub paid: Money,
    /// Σ parts paid with `Credit`.
    pub credit: Money,
    /// Σ parts paid with `Balance`.
    pub balance: Money,
}

impl PaymentSummary {
    /// Sums a payment set.
    ///
    /// On overflow, `Err` holds the index of the first part that no longer
    /// fits in the running total.
    pub fn of(payments: &[PaymentPart]) -> Result<Self, usize> {
        let mut acc = PaymentSummary::default();
        for (index, part) in payments.iter().enumerate() {
            acc.paid = acc.paid.checked_add(part.amount).ok_or(index)?;
            match part.method {
                PaymentMethod::Credit => {
                    acc.credit = acc.credit.checked_add(part.amount).ok_or(index)?
                }
                PaymentMethod::Balance => {
                    acc.balance = acc.balance.checked_add(part.amount).ok_or(index)?
                }
                _ => {}
            }
        }
        Ok(acc)
    }

    /// Portion of the credit covered by balance payments in the same sale.
    pub fn credit_covered(&self) -> Money {
        self.balance.min(self.credit).non_negative()
    }
}

// =============================================================================
// Sale
// =============================================================================

/// The immutable record of a settled cart.
///
/// After creation only `is_refunded` (refund) and `is_paid` (settling
/// outstanding credit) may change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub event_id: String,
    pub order_id: String,
    /// Cart lines frozen at confirmation.
    pub items: Vec<CartLine>,
    pub total: Money,
    pub payments: Vec<PaymentPart>,
    pub customer_id: Option<String>,
    pub is_paid: bool,
    pub is_refunded: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Sale {
    /// Σ payments made with `Credit`: the debt this sale created.
    pub fn credit_amount(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.method == PaymentMethod::Credit)
            .map(|p| p.amount)
            .sum()
    }

    /// Σ all payment parts.
    pub fn amount_paid(&self) -> Money {
        self.payments.iter().map(|p| p.amount).sum()
    }

    pub fn total_quantity(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Customers
// =============================================================================

/// A customer that may buy on credit. Owned by customer management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerAccount {
    pub id: String,
    pub name: String,
    /// Signed; negative records debt that predates the system.
    pub initial_balance: Money,
}

/// Kind of customer ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Purchase,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Purchase => "purchase",
            TransactionType::Refund => "refund",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only entry of a customer's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CustomerTransaction {
    pub id: String,
    pub customer_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Magnitude, always >= 0.
    pub amount: Money,
    /// Purchases only: portion already settled, 0 <= amount_paid <= amount.
    pub amount_paid: Money,
    pub sale_id: Option<String>,
    pub event_id: Option<String>,
    pub category_id: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CustomerTransaction {
    fn base(
        customer_id: &str,
        kind: TransactionType,
        amount: Money,
        created_by: &str,
    ) -> CustomerTransaction {
        CustomerTransaction {
            id: new_id(),
            customer_id: customer_id.to_string(),
            kind,
            amount,
            amount_paid: Money::zero(),
            sale_id: None,
            event_id: None,
            category_id: None,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        }
    }

    /// A credit purchase tied to a sale. `amount_paid` is capped at `amount`.
    pub fn purchase(
        customer_id: &str,
        sale: &Sale,
        amount: Money,
        amount_paid: Money,
        created_by: &str,
    ) -> CustomerTransaction {
        let mut tx = Self::base(customer_id, TransactionType::Purchase, amount, created_by);
        tx.amount_paid = amount_paid.min(amount).non_negative();
        tx.sale_id = Some(sale.id.clone());
        tx.event_id = Some(sale.event_id.clone());
        tx
    }

    /// Compensating entry written when a sale is refunded.
    pub fn refund(customer_id: &str, sale: &Sale, amount: Money, created_by: &str) -> Self {
        let mut tx = Self::base(customer_id, TransactionType::Refund, amount, created_by);
        tx.sale_id = Some(sale.id.clone());
        tx.event_id = Some(sale.event_id.clone());
        tx
    }

    pub fn deposit(customer_id: &str, amount: Money, created_by: &str) -> Self {
        Self::base(customer_id, TransactionType::Deposit, amount, created_by)
    }

    pub fn withdrawal(customer_id: &str, amount: Money, created_by: &str) -> Self {
        Self::base(customer_id, TransactionType::Withdrawal, amount, created_by)
    }

    /// Tags the entry with an event and a category.
    pub fn with_tags(mut self, tags: EntryTags) -> Self {
        self.event_id = tags.event_id;
        self.category_id = tags.category_id;
        self
    }

    /// Signed contribution of this entry to the customer's balance.
    pub fn balance_effect(&self) -> Money {
        match self.kind {
            TransactionType::Deposit => self.amount,
            TransactionType::Withdrawal => -self.amount,
            TransactionType::Purchase => -(self.amount - self.amount_paid),
            TransactionType::Refund => self.amount,
        }
    }

    /// Unpaid part of a purchase; zero for other kinds.
    pub fn outstanding(&self) -> Money {
        match self.kind {
            TransactionType::Purchase => (self.amount - self.amount_paid).non_negative(),
            _ => Money::zero(),
        }
    }
}

/// Event and category a deposit or withdrawal belongs to.
///
/// Purchases and refunds take their event from the sale and carry no
/// category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EntryTags {
    pub event_id: Option<String>,
    pub category_id: Option<String>,
}

impl EntryTags {
    pub fn for_event(event_id: impl Into<String>) -> Self {
        EntryTags {
            event_id: Some(event_id.into()),
            category_id: None,
        }
    }

    pub fn category(mut self, category_id: impl Into<String>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }
}

// =============================================================================
// History Filter
// =============================================================================

/// Optional filter for reading a customer's ledger history.
///
/// All set fields must match. The date range is `[from, to)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct HistoryFilter {
    pub event_id: Option<String>,
    pub category_id: Option<String>,
    pub kind: Option<TransactionType>,
    #[ts(as = "Option<String>")]
    pub from: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub to: Option<DateTime<Utc>>,
}

impl HistoryFilter {
    pub fn for_event(event_id: impl Into<String>) -> Self {
        HistoryFilter {
            event_id: Some(event_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, tx: &CustomerTransaction) -> bool {
        if let Some(ref event_id) = self.event_id {
            if tx.event_id.as_deref() != Some(event_id.as_str()) {
                return false;
            }
        }
        if let Some(ref category_id) = self.category_id {
            if tx.category_id.as_deref() != Some(category_id.as_str()) {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if tx.kind != kind {
                return false;
            }
        }
        if let Some(from) = self.from {
            if tx.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if tx.created_at >= to {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Operation Results
// =============================================================================

/// What `add_or_set_line` actually did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LineUpdate {
    pub menu_item_id: String,
    pub requested: i64,
    /// Quantity now held by the cart for this item.
    pub applied: i64,
    /// True when `applied < requested` because of stock or the line ceiling.
    pub clamped: bool,
}

/// Outcome of a refund.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefundRecord {
    pub sale_id: String,
    pub order_id: String,
    pub reason: String,
    pub refunded_by: String,
    #[ts(as = "String")]
    pub refunded_at: DateTime<Utc>,
    /// Lines whose units went back on sale.
    pub restocked: Vec<CartLine>,
    /// Debt given back to the customer (Σ credit parts of the sale).
    pub credit_restored: Money,
    /// Id of the compensating ledger entry, if the sale had a customer.
    pub ledger_entry_id: Option<String>,
}

/// Part of a "settle outstanding credit" payment applied to one purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreditAllocation {
    pub transaction_id: String,
    pub sale_id: Option<String>,
    pub applied: Money,
    /// The purchase has no outstanding debt left.
    pub fully_paid: bool,
}

/// Result of settling outstanding credit for a customer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreditSettlement {
    pub allocations: Vec<CreditAllocation>,
    /// Part of the payment not needed to clear any purchase.
    pub remainder: Money,
}

impl CreditSettlement {
    pub fn applied(&self) -> Money {
        self.allocations.iter().map(|a| a.applied).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, price_cents: i64) -> MenuItem {
        MenuItem {
            id: id.to_string(),
            event_id: "festa-junina".to_string(),
            name: format!("Item {}", id),
            price: Money::from_cents(price_cents),
            capacity: 10,
            sold_count: 0,
        }
    }

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Open.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Open.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Open.can_transition_to(OrderStatus::Open));
        assert!(!OrderStatus::Confirmed.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Open));
        assert!(OrderStatus::Cancelled.is_terminal());
        assert_eq!(OrderStatus::default(), OrderStatus::Open);
    }

    #[test]
    fn test_cart_set_line_and_total() {
        let mut cart = OrderCart::new("festa-junina", "ana");
        let pastel = item("pastel", 800);
        let caldo = item("caldo", 1200);

        cart.set_line(&pastel, 2);
        cart.set_line(&caldo, 1);
        assert_eq!(cart.total().cents(), 2800);
        assert_eq!(cart.line_count(), 2);

        cart.set_line(&pastel, 3);
        assert_eq!(cart.quantity_of("pastel"), 3);
        assert_eq!(cart.line_count(), 2);
        assert_eq!(cart.total_quantity(), 4);

        cart.set_line(&pastel, 0);
        assert!(cart.line("pastel").is_none());
        assert_eq!(cart.total().cents(), 1200);
    }

    #[test]
    fn test_cart_line_keeps_frozen_price() {
        let mut cart = OrderCart::new("festa-junina", "ana");
        let mut pastel = item("pastel", 800);
        cart.set_line(&pastel, 1);

        pastel.price = Money::from_cents(900);
        cart.set_line(&pastel, 2);

        assert_eq!(cart.line("pastel").unwrap().unit_price.cents(), 800);
        assert_eq!(cart.total().cents(), 1600);
    }

    #[test]
    fn test_cart_checked_total_with() {
        let mut cart = OrderCart::new("festa-junina", "ana");
        let pastel = item("pastel", 800);
        cart.set_line(&pastel, 2);

        let caldo = item("caldo", 1200);
        assert_eq!(cart.checked_total_with(&caldo, 3).unwrap().cents(), 5200);
        assert_eq!(cart.checked_total_with(&pastel, 5).unwrap().cents(), 4000);
        assert_eq!(cart.checked_total(), Some(cart.total()));

        let gold = item("gold", i64::MAX / 2);
        assert_eq!(cart.checked_total_with(&gold, 2), None);
        assert_eq!(cart.checked_total_with(&gold, 1).map(|m| m.cents()), Some(i64::MAX / 2 + 1600));
    }

    #[test]
    fn test_cart_transitions_are_terminal() {
        let mut cart = OrderCart::new("festa-junina", "ana");
        cart.transition_to(OrderStatus::Cancelled).unwrap();

        let err = cart.transition_to(OrderStatus::Confirmed).unwrap_err();
        assert!(matches!(err, CoreError::OrderNotPending { .. }));
        assert!(cart.ensure_open().is_err());
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("Fiado".parse::<PaymentMethod>().unwrap(), PaymentMethod::Credit);
        assert_eq!("pix".parse::<PaymentMethod>().unwrap(), PaymentMethod::Transfer);
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_summary() {
        let parts = [
            PaymentPart::new(PaymentMethod::Cash, Money::from_cents(300)),
            PaymentPart::new(PaymentMethod::Credit, Money::from_cents(500)),
            PaymentPart::new(PaymentMethod::Balance, Money::from_cents(700)),
        ];
        let summary = PaymentSummary::of(&parts).unwrap();
        assert_eq!(summary.paid.cents(), 1500);
        assert_eq!(summary.credit.cents(), 500);
        assert_eq!(summary.balance.cents(), 700);
        assert_eq!(summary.credit_covered().cents(), 500);
    }

    #[test]
    fn test_payment_summary_overflow_names_part() {
        let parts = [
            PaymentPart::new(PaymentMethod::Cash, Money::from_cents(100)),
            PaymentPart::new(PaymentMethod::Card, Money::from_cents(i64::MAX - 100)),
            PaymentPart::new(PaymentMethod::Credit, Money::from_cents(1)),
        ];
        assert_eq!(PaymentSummary::of(&parts), Err(2));
        assert_eq!(PaymentSummary::of(&parts[..2]).unwrap().paid.cents(), i64::MAX);
    }

    #[test]
    fn test_transaction_balance_effects() {
        let deposit = CustomerTransaction::deposit("c1", Money::from_cents(1000), "ana");
        let withdrawal = CustomerTransaction::withdrawal("c1", Money::from_cents(300), "ana");
        assert_eq!(deposit.balance_effect().cents(), 1000);
        assert_eq!(withdrawal.balance_effect().cents(), -300);
        assert_eq!(deposit.outstanding(), Money::zero());
    }

    #[test]
    fn test_purchase_caps_amount_paid() {
        let sale = Sale {
            id: "s1".to_string(),
            event_id: "festa-junina".to_string(),
            order_id: "o1".to_string(),
            items: vec![],
            total: Money::from_cents(1000),
            payments: vec![],
            customer_id: Some("c1".to_string()),
            is_paid: false,
            is_refunded: false,
            created_at: Utc::now(),
            created_by: "ana".to_string(),
        };
        let tx = CustomerTransaction::purchase(
            "c1",
            &sale,
            Money::from_cents(600),
            Money::from_cents(900),
            "ana",
        );
        assert_eq!(tx.amount_paid.cents(), 600);
        assert_eq!(tx.balance_effect(), Money::zero());
        assert_eq!(tx.event_id.as_deref(), Some("festa-junina"));
    }

    #[test]
    fn test_history_filter_matches() {
        let tx = CustomerTransaction::deposit("c1", Money::from_cents(100), "ana")
            .with_tags(EntryTags::for_event("e1").category("drinks"));

        assert!(HistoryFilter::default().matches(&tx));
        assert!(HistoryFilter::for_event("e1").matches(&tx));
        assert!(!HistoryFilter::for_event("e2").matches(&tx));

        let by_category = |c: &str| HistoryFilter {
            category_id: Some(c.to_string()),
            ..Default::default()
        };
        assert!(by_category("drinks").matches(&tx));
        assert!(!by_category("food").matches(&tx));

        let by_kind = HistoryFilter {
            kind: Some(TransactionType::Purchase),
            ..Default::default()
        };
        assert!(!by_kind.matches(&tx));

        let future = HistoryFilter {
            from: Some(tx.created_at + chrono::Duration::seconds(1)),
            ..Default::default()
        };
        assert!(!future.matches(&tx));
    }

    #[test]
    fn test_transaction_serializes_type_field() {
        let tx = CustomerTransaction::deposit("c1", Money::from_cents(100), "ana");
        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["type"], "deposit");
        assert_eq!(json["amountPaid"], 0);
    }
}
