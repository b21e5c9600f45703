//! # Stock Ledger
//!
//! Single source of truth for "units available right now".
//!
//! ## Counters per Menu Item
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  capacity ─────────────────────────────────────────────┐  (0 = ∞)      │
//! │                                                        │               │
//! │  ┌──────────────────────┬─────────────────┬────────────┤               │
//! │  │     sold_count       │    reserved     │ available  │               │
//! │  │  (confirmed sales)   │  (open carts)   │            │               │
//! │  └──────────────────────┴─────────────────┴────────────┘               │
//! │                                                                         │
//! │  reserve(+n)    reserved += n        fails if it would exceed capacity │
//! │  reserve(-n)    reserved -= n                                          │
//! │  commit(n)      reserved -= n, sold_count += n                         │
//! │  release(n, Reservation)   reserved -= n                               │
//! │  release(n, Refund)        sold_count -= n                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! Each item's counters sit behind their own `parking_lot::Mutex`. Different
//! items never contend. Multi-item operations lock records in sorted id
//! order, check every record, and only then apply.

use std::collections::BTreeMap;
use std::sync::Arc;

use cantina_core::{CoreError, CoreResult, MenuItem};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::collaborators::MenuCatalog;
use crate::error::{EngineError, EngineResult};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, Clone)]
struct StockRecord {
    menu_item_id: String,
    capacity: i64,
    sold_count: i64,
    reserved: i64,
}

impl StockRecord {
    fn from_menu_item(item: &MenuItem) -> Self {
        StockRecord {
            menu_item_id: item.id.clone(),
            capacity: item.capacity.max(0),
            sold_count: item.sold_count.max(0),
            reserved: 0,
        }
    }

    fn is_unlimited(&self) -> bool {
        self.capacity == 0
    }

    /// Units a cart may still reserve. `None` when unlimited.
    fn available(&self) -> Option<i64> {
        if self.is_unlimited() {
            None
        } else {
            Some((self.capacity - self.sold_count - self.reserved).max(0))
        }
    }

    fn level(&self) -> StockLevel {
        StockLevel {
            menu_item_id: self.menu_item_id.clone(),
            capacity: self.capacity,
            sold_count: self.sold_count,
            reserved: self.reserved,
            available: self.available(),
        }
    }
}

/// Read-only view of one item's counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockLevel {
    pub menu_item_id: String,
    pub capacity: i64,
    pub sold_count: i64,
    pub reserved: i64,
    /// `None` = unlimited.
    pub available: Option<i64>,
}

/// How `release` gives units back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// An open cart drops units it was holding.
    Reservation,
    /// A refunded sale puts sold units back on sale.
    Refund,
}

/// Result of an atomic clamped reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    /// Units actually reserved (≤ requested).
    pub granted: i64,
    /// Reserved total for the item after the call.
    pub reserved_total: i64,
}

// =============================================================================
// Stock Ledger
// =============================================================================

pub struct StockLedger {
    catalog: Arc<dyn MenuCatalog>,
    records: DashMap<String, Arc<Mutex<StockRecord>>>,
}

impl StockLedger {
    pub fn new(catalog: Arc<dyn MenuCatalog>) -> Self {
        StockLedger {
            catalog,
            records: DashMap::new(),
        }
    }

    /// Returns the record for an item, loading it from the catalog the first
    /// time it is touched.
    fn record(&self, menu_item_id: &str) -> CoreResult<Arc<Mutex<StockRecord>>> {
        if let Some(existing) = self.records.get(menu_item_id) {
            return Ok(Arc::clone(existing.value()));
        }

        let item = self
            .catalog
            .menu_item(menu_item_id)
            .ok_or_else(|| CoreError::MenuItemNotFound(menu_item_id.to_string()))?;

        // Another thread may have loaded it meanwhile; keep whichever landed first.
        let entry = self
            .records
            .entry(menu_item_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(StockRecord::from_menu_item(&item))));
        Ok(Arc::clone(entry.value()))
    }

    /// Loads and locks the records for `lines` in sorted id order.
    ///
    /// Quantities for the same id are merged.
    fn lock_sorted(
        &self,
        lines: &[(String, i64)],
    ) -> CoreResult<Vec<(i64, Arc<Mutex<StockRecord>>)>> {
        let mut merged: BTreeMap<&str, i64> = BTreeMap::new();
        for (id, quantity) in lines {
            *merged.entry(id.as_str()).or_insert(0) += *quantity;
        }

        merged
            .into_iter()
            .map(|(id, quantity)| Ok((quantity, self.record(id)?)))
            .collect()
    }

    // =========================================================================
    // Reservations
    // =========================================================================

    /// Adjusts an item's reservation by `delta` (positive or negative).
    ///
    /// Returns the new reserved total. A positive delta that would push
    /// `sold_count + reserved` past capacity fails with `StockInsufficient`
    /// and changes nothing.
    pub fn reserve(&self, menu_item_id: &str, delta: i64) -> CoreResult<i64> {
        debug!(menu_item_id, delta, "Reserving stock");
        let record = self.record(menu_item_id)?;
        let mut rec = record.lock();

        if delta > 0 {
            if let Some(available) = rec.available() {
                if delta > available {
                    return Err(CoreError::StockInsufficient {
                        menu_item_id: menu_item_id.to_string(),
                        available,
                        requested: delta,
                    });
                }
            }
            rec.reserved += delta;
        } else if delta < 0 {
            let give_back = (-delta).min(rec.reserved);
            if give_back < -delta {
                warn!(
                    menu_item_id,
                    delta,
                    reserved = rec.reserved,
                    "Release larger than reservation, clamping to zero"
                );
            }
            rec.reserved -= give_back;
        }

        Ok(rec.reserved)
    }

    /// Reserves as many of `wanted` units as capacity allows, atomically.
    ///
    /// This is the check and the update of a clamped cart line in one lock
    /// scope, so two carts can never both take the last unit.
    pub fn reserve_up_to(&self, menu_item_id: &str, wanted: i64) -> CoreResult<Reservation> {
        let record = self.record(menu_item_id)?;
        let mut rec = record.lock();

        let wanted = wanted.max(0);
        let granted = match rec.available() {
            Some(available) => wanted.min(available),
            None => wanted,
        };
        rec.reserved += granted;

        if granted < wanted {
            warn!(menu_item_id, wanted, granted, "Reservation clamped by stock");
        }

        Ok(Reservation {
            granted,
            reserved_total: rec.reserved,
        })
    }

    // =========================================================================
    // Commit / Rollback
    // =========================================================================

    /// Converts one reservation into a sale.
    pub fn commit(&self, menu_item_id: &str, quantity: i64) -> EngineResult<()> {
        self.commit_all(&[(menu_item_id.to_string(), quantity)])
    }

    /// Converts the reservations of every line into sales, all or nothing.
    ///
    /// Every record must still hold at least the committed quantity in
    /// reserve. If any does not, nothing is applied and an invariant error
    /// is returned: the cart lost its reservation.
    pub fn commit_all(&self, lines: &[(String, i64)]) -> EngineResult<()> {
        debug!(lines = lines.len(), "Committing stock");
        let records = self.lock_sorted(lines).map_err(|e| {
            EngineError::invariant("stock commit", format!("stock record unavailable: {}", e))
        })?;
        let mut guards: Vec<(i64, MutexGuard<'_, StockRecord>)> =
            records.iter().map(|(q, r)| (*q, r.lock())).collect();

        for (quantity, rec) in &guards {
            if rec.reserved < *quantity {
                error!(
                    menu_item_id = %rec.menu_item_id,
                    reserved = rec.reserved,
                    quantity,
                    "Reservation lost before commit"
                );
                return Err(EngineError::invariant(
                    "stock commit",
                    format!(
                        "{} holds {} reserved, cannot commit {}",
                        rec.menu_item_id, rec.reserved, quantity
                    ),
                ));
            }
            if !rec.is_unlimited() && rec.sold_count + quantity > rec.capacity {
                error!(menu_item_id = %rec.menu_item_id, "Commit would exceed capacity");
                return Err(EngineError::invariant(
                    "stock commit",
                    format!("{} would exceed capacity {}", rec.menu_item_id, rec.capacity),
                ));
            }
        }

        for (quantity, rec) in guards.iter_mut() {
            rec.reserved -= *quantity;
            rec.sold_count += *quantity;
        }

        Ok(())
    }

    /// Undoes a `commit_all`: units go back from sold to reserved.
    ///
    /// Used when a later step of a confirmation fails.
    pub fn rollback_commit(&self, lines: &[(String, i64)]) -> EngineResult<()> {
        warn!(lines = lines.len(), "Rolling back stock commit");
        let records = self.lock_sorted(lines).map_err(|e| {
            EngineError::invariant("stock rollback", format!("stock record unavailable: {}", e))
        })?;
        let mut guards: Vec<(i64, MutexGuard<'_, StockRecord>)> =
            records.iter().map(|(q, r)| (*q, r.lock())).collect();

        for (quantity, rec) in guards.iter_mut() {
            let back = (*quantity).min(rec.sold_count);
            rec.sold_count -= back;
            rec.reserved += back;
        }
        Ok(())
    }

    // =========================================================================
    // Release
    // =========================================================================

    /// Gives units back. See [`ReleaseMode`].
    pub fn release(&self, menu_item_id: &str, quantity: i64, mode: ReleaseMode) -> CoreResult<()> {
        self.release_all(&[(menu_item_id.to_string(), quantity)], mode)
    }

    /// Gives units back for several items under one set of locks.
    ///
    /// Counters saturate at zero.
    pub fn release_all(&self, lines: &[(String, i64)], mode: ReleaseMode) -> CoreResult<()> {
        debug!(lines = lines.len(), ?mode, "Releasing stock");
        let records = self.lock_sorted(lines)?;
        let mut guards: Vec<(i64, MutexGuard<'_, StockRecord>)> =
            records.iter().map(|(q, r)| (*q, r.lock())).collect();

        for (quantity, rec) in guards.iter_mut() {
            let quantity = (*quantity).max(0);
            match mode {
                ReleaseMode::Reservation => {
                    rec.reserved = (rec.reserved - quantity).max(0);
                }
                ReleaseMode::Refund => {
                    if rec.sold_count < quantity {
                        warn!(
                            menu_item_id = %rec.menu_item_id,
                            sold = rec.sold_count,
                            quantity,
                            "Refund exceeds sold count, clamping to zero"
                        );
                    }
                    rec.sold_count = (rec.sold_count - quantity).max(0);
                }
            }
        }
        Ok(())
    }

    /// Makes sure records exist for every id, without touching counters.
    pub fn preload(&self, menu_item_ids: &[&str]) -> CoreResult<()> {
        for id in menu_item_ids {
            self.record(id)?;
        }
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn snapshot(&self, menu_item_id: &str) -> CoreResult<StockLevel> {
        let record = self.record(menu_item_id)?;
        let level = record.lock().level();
        Ok(level)
    }

    /// Units still available. `None` = unlimited.
    pub fn available(&self, menu_item_id: &str) -> CoreResult<Option<i64>> {
        Ok(self.snapshot(menu_item_id)?.available)
    }
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("records", &self.records.len())
            .finish()
    }
}
