//! Settled sales, keyed by id.
//!
//! Each sale sits behind its own mutex so a refund holds exactly that sale
//! while it runs, and nothing else.

use std::sync::Arc;

use cantina_core::{CoreError, CoreResult, Sale};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
pub struct SaleBook {
    sales: DashMap<String, Arc<Mutex<Sale>>>,
}

impl SaleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, sale: Sale) {
        debug!(sale_id = %sale.id, "Storing sale");
        self.sales.insert(sale.id.clone(), Arc::new(Mutex::new(sale)));
    }

    /// Shared handle for callers that must hold the sale's lock.
    pub(crate) fn handle(&self, sale_id: &str) -> CoreResult<Arc<Mutex<Sale>>> {
        self.sales
            .get(sale_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))
    }

    pub fn get(&self, sale_id: &str) -> CoreResult<Sale> {
        let handle = self.handle(sale_id)?;
        let sale = handle.lock().clone();
        Ok(sale)
    }

    /// Sales of one event, oldest first.
    pub fn for_event(&self, event_id: &str) -> Vec<Sale> {
        let mut sales: Vec<Sale> = self
            .sales
            .iter()
            .filter_map(|entry| {
                let sale = entry.value().lock();
                let matched = if sale.event_id == event_id {
                    Some(sale.clone())
                } else {
                    None
                };
                matched
            })
            .collect();
        sales.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sales
    }

    /// Flips `is_paid` once a sale's credit is fully settled.
    ///
    /// Returns whether the flag changed. A refunded sale is left alone.
    pub fn mark_paid(&self, sale_id: &str) -> CoreResult<bool> {
        let handle = self.handle(sale_id)?;
        let mut sale = handle.lock();
        if sale.is_paid || sale.is_refunded {
            return Ok(false);
        }
        sale.is_paid = true;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.sales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sales.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cantina_core::Money;
    use chrono::{Duration, Utc};

    fn sale(id: &str, event: &str, age_secs: i64) -> Sale {
        Sale {
            id: id.into(),
            event_id: event.into(),
            order_id: format!("o-{}", id),
            items: vec![],
            total: Money::from_cents(100),
            payments: vec![],
            customer_id: None,
            is_paid: false,
            is_refunded: false,
            created_at: Utc::now() - Duration::seconds(age_secs),
            created_by: "ana".into(),
        }
    }

    #[test]
    fn test_get_and_missing() {
        let book = SaleBook::new();
        book.insert(sale("s1", "festa", 0));
        assert_eq!(book.get("s1").unwrap().order_id, "o-s1");
        assert!(matches!(book.get("nope").unwrap_err(), CoreError::SaleNotFound(_)));
    }

    #[test]
    fn test_for_event_is_ordered() {
        let book = SaleBook::new();
        book.insert(sale("late", "festa", 1));
        book.insert(sale("early", "festa", 60));
        book.insert(sale("other", "bingo", 30));

        let ids: Vec<String> = book.for_event("festa").into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn test_mark_paid_once() {
        let book = SaleBook::new();
        book.insert(sale("s1", "festa", 0));
        assert!(book.mark_paid("s1").unwrap());
        assert!(!book.mark_paid("s1").unwrap());
        assert!(book.get("s1").unwrap().is_paid);
    }

    #[test]
    fn test_mark_paid_skips_refunded() {
        let book = SaleBook::new();
        let mut refunded = sale("s1", "festa", 0);
        refunded.is_refunded = true;
        book.insert(refunded);

        assert!(!book.mark_paid("s1").unwrap());
        assert!(!book.get("s1").unwrap().is_paid);
    }
}
