//! # Order Carts
//!
//! Open carts and their stock reservations.
//!
//! ## Thread Safety
//! Every cart is wrapped in `Arc<Mutex<OrderCart>>` because:
//! 1. One staff session owns a cart, but requests may still overlap
//! 2. Confirmation must hold the cart while it commits stock
//! 3. Many carts contend on the same menu items through the `StockLedger`
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  Staff Action             Registry Call            Stock Effect         │
//! │  ────────────             ─────────────            ────────────         │
//! │                                                                         │
//! │  Start order ────────────► create() ──────────────► (none)             │
//! │                                                                         │
//! │  Set quantity ───────────► add_or_set_line() ─────► reserve(Δ)         │
//! │                            clamps to what is left                       │
//! │                                                                         │
//! │  Click Remove ───────────► remove_line() ─────────► release(q)         │
//! │                                                                         │
//! │  Abandon order ──────────► cancel() ──────────────► release(all)       │
//! │                                                                         │
//! │  Pay ────────────────────► SettlementEngine::confirm()                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use cantina_core::validation::{clamp_line_quantity, validate_required};
use cantina_core::{
    CartLine, CoreError, CoreResult, LineUpdate, Money, OrderCart, OrderStatus, ValidationError,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::collaborators::{audit_value, AuditEntry, AuditSink, MenuCatalog};
use crate::config::SettlementSettings;
use crate::stock::{ReleaseMode, StockLedger};

pub struct CartRegistry {
    stock: Arc<StockLedger>,
    catalog: Arc<dyn MenuCatalog>,
    audit: Arc<dyn AuditSink>,
    max_cart_lines: usize,
    max_line_quantity: i64,
    carts: DashMap<String, Arc<Mutex<OrderCart>>>,
}

impl CartRegistry {
    pub fn new(
        stock: Arc<StockLedger>,
        catalog: Arc<dyn MenuCatalog>,
        audit: Arc<dyn AuditSink>,
        settings: &SettlementSettings,
    ) -> Self {
        CartRegistry {
            stock,
            catalog,
            audit,
            max_cart_lines: settings.max_cart_lines,
            max_line_quantity: settings.max_line_quantity,
            carts: DashMap::new(),
        }
    }

    /// Starts an empty, open cart for an event.
    pub fn create(&self, event_id: &str, staff_id: &str) -> CoreResult<OrderCart> {
        validate_required("event id", event_id)?;
        validate_required("staff id", staff_id)?;

        let cart = OrderCart::new(event_id, staff_id);
        self.carts
            .insert(cart.id.clone(), Arc::new(Mutex::new(cart.clone())));

        info!(order_id = %cart.id, event_id, staff_id, "Cart created");
        self.audit.record(AuditEntry::new(
            "order",
            cart.id.clone(),
            "create",
            audit_value(&cart),
            staff_id,
        ));

        Ok(cart)
    }

    pub(crate) fn handle(&self, order_id: &str) -> CoreResult<Arc<Mutex<OrderCart>>> {
        self.carts
            .get(order_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))
    }

    /// Copy of the cart as it is right now.
    pub fn get(&self, order_id: &str) -> CoreResult<OrderCart> {
        let handle = self.handle(order_id)?;
        let cart = handle.lock().clone();
        Ok(cart)
    }

    /// Σ unit price × quantity over the cart's lines.
    pub fn total(&self, order_id: &str) -> CoreResult<Money> {
        let handle = self.handle(order_id)?;
        let total = handle.lock().total();
        Ok(total)
    }

    /// Sets a line to `quantity`, reserving or releasing the difference.
    ///
    /// `quantity <= 0` removes the line. A positive quantity is capped at
    /// the per-line ceiling and at whatever stock is left; the returned
    /// [`LineUpdate`] says what was actually applied. The call only fails
    /// with `StockInsufficient` when not a single unit could be held.
    pub fn add_or_set_line(
        &self,
        order_id: &str,
        menu_item_id: &str,
        quantity: i64,
    ) -> CoreResult<LineUpdate> {
        debug!(order_id, menu_item_id, quantity, "Setting cart line");
        let handle = self.handle(order_id)?;
        let mut cart = handle.lock();
        cart.ensure_open()?;

        if quantity <= 0 {
            if let Some(line) = cart.remove_line(menu_item_id) {
                self.stock
                    .release(menu_item_id, line.quantity, ReleaseMode::Reservation)?;
            }
            return Ok(LineUpdate {
                menu_item_id: menu_item_id.to_string(),
                requested: quantity,
                applied: 0,
                clamped: false,
            });
        }

        let item = self
            .catalog
            .menu_item(menu_item_id)
            .ok_or_else(|| CoreError::MenuItemNotFound(menu_item_id.to_string()))?;
        if item.event_id != cart.event_id {
            return Err(CoreError::MenuItemNotInEvent {
                menu_item_id: menu_item_id.to_string(),
                event_id: cart.event_id.clone(),
            });
        }

        let current = cart.quantity_of(menu_item_id);
        if current == 0 && cart.line_count() >= self.max_cart_lines {
            return Err(CoreError::CartTooLarge {
                max: self.max_cart_lines,
            });
        }

        let target = clamp_line_quantity(quantity, self.max_line_quantity);
        if cart.checked_total_with(&item, target).is_none() {
            warn!(order_id, menu_item_id, target, "Cart total would overflow");
            return Err(total_overflow());
        }
        let delta = target - current;
        let applied = if delta > 0 {
            let reservation = self.stock.reserve_up_to(menu_item_id, delta)?;
            current + reservation.granted
        } else {
            if delta < 0 {
                self.stock.reserve(menu_item_id, delta)?;
            }
            target
        };

        if applied == 0 {
            return Err(CoreError::StockInsufficient {
                menu_item_id: menu_item_id.to_string(),
                available: 0,
                requested: quantity,
            });
        }

        cart.set_line(&item, applied);

        let clamped = applied < quantity;
        if clamped {
            warn!(order_id, menu_item_id, requested = quantity, applied, "Cart line clamped");
        }

        Ok(LineUpdate {
            menu_item_id: menu_item_id.to_string(),
            requested: quantity,
            applied,
            clamped,
        })
    }

    /// Deletes a line and releases its whole reservation.
    pub fn remove_line(&self, order_id: &str, menu_item_id: &str) -> CoreResult<CartLine> {
        debug!(order_id, menu_item_id, "Removing cart line");
        let handle = self.handle(order_id)?;
        let mut cart = handle.lock();
        cart.ensure_open()?;

        let line = cart
            .remove_line(menu_item_id)
            .ok_or_else(|| CoreError::LineNotFound {
                order_id: order_id.to_string(),
                menu_item_id: menu_item_id.to_string(),
            })?;
        self.stock
            .release(menu_item_id, line.quantity, ReleaseMode::Reservation)?;

        Ok(line)
    }

    /// Releases every reservation and closes the cart for good.
    pub fn cancel(&self, order_id: &str, staff_id: &str) -> CoreResult<OrderCart> {
        let handle = self.handle(order_id)?;
        let mut cart = handle.lock();
        cart.ensure_open()?;

        let held: Vec<(String, i64)> = cart
            .lines
            .iter()
            .map(|l| (l.menu_item_id.clone(), l.quantity))
            .collect();
        self.stock.release_all(&held, ReleaseMode::Reservation)?;
        cart.transition_to(OrderStatus::Cancelled)?;

        info!(order_id, staff_id, lines = held.len(), "Cart cancelled");
        self.audit.record(
            AuditEntry::new(
                "order",
                order_id,
                "cancel",
                json!({ "status": OrderStatus::Cancelled.as_str() }),
                staff_id,
            )
            .with_previous(json!({ "status": OrderStatus::Open.as_str() })),
        );

        Ok(cart.clone())
    }
}

/// Error for a cart whose total no longer fits in an i64.
pub(crate) fn total_overflow() -> CoreError {
    ValidationError::OutOfRange {
        field: "cart total".to_string(),
        min: 0,
        max: i64::MAX,
    }
    .into()
}

impl std::fmt::Debug for CartRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartRegistry")
            .field("carts", &self.carts.len())
            .field("max_cart_lines", &self.max_cart_lines)
            .field("max_line_quantity", &self.max_line_quantity)
            .finish()
    }
}
