//! Many terminals racing for the same stock and the same sale.

mod common;

use std::sync::Arc;

use cantina_core::{EntryTags, ErrorCode, Money, PaymentMethod};
use common::*;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_carts_never_oversell() {
    const CAPACITY: i64 = 5;
    const TERMINALS: usize = 32;

    let t = engine_with(vec![menu_item("pastel", 800, CAPACITY)], vec![]);
    let engine = Arc::new(t.engine);

    let mut handles = Vec::with_capacity(TERMINALS);
    for i in 0..TERMINALS {
        let engine = Arc::clone(&engine);
        handles.push(tokio::task::spawn_blocking(move || {
            let staff = format!("terminal-{}", i);
            let cart = engine.create_order(EVENT, &staff).unwrap();
            match engine.add_or_set_line(&cart.id, "pastel", 1) {
                Ok(update) => {
                    assert_eq!(update.applied, 1);
                    engine
                        .confirm(&cart.id, &[pay(PaymentMethod::Cash, 800)], &staff, None)
                        .map(|_| true)
                        .unwrap()
                }
                Err(e) => {
                    assert_eq!(e.code(), ErrorCode::StockInsufficient);
                    engine.cancel_order(&cart.id, &staff).unwrap();
                    false
                }
            }
        }));
    }

    let mut sold = 0;
    for handle in handles {
        if handle.await.unwrap() {
            sold += 1;
        }
    }

    assert_eq!(sold, CAPACITY);
    let level = engine.stock_level("pastel").unwrap();
    assert_eq!(level.sold_count, CAPACITY);
    assert_eq!(level.reserved, 0);
    assert_eq!(level.available, Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_refunds_apply_once() {
    let t = engine_with(vec![menu_item("caldo", 1200, 10)], vec![customer("maria", 0)]);
    let engine = Arc::new(t.engine);

    let order = open_cart(&engine, &[("caldo", 2)]);
    let sale = engine
        .confirm(&order, &[pay(PaymentMethod::Credit, 2400)], STAFF, Some("maria"))
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        let sale_id = sale.id.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            engine.refund(&sale_id, "duplicate tap", STAFF).is_ok()
        }));
    }

    let mut applied = 0;
    for handle in handles {
        if handle.await.unwrap() {
            applied += 1;
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(engine.stock_level("caldo").unwrap().sold_count, 0);
    assert_eq!(engine.balance_of("maria").unwrap().cents(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn balance_reads_during_writes_are_consistent() {
    let t = engine_with(vec![], vec![customer("maria", 0)]);
    let engine = Arc::new(t.engine);

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || {
            for _ in 0..200 {
                engine
                    .deposit("maria", Money::from_cents(100), STAFF, EntryTags::default())
                    .unwrap();
            }
        })
    };
    let reader = {
        let engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || {
            for _ in 0..200 {
                let cents = engine.balance_of("maria").unwrap().cents();
                assert_eq!(cents % 100, 0);
                assert!((0..=20_000).contains(&cents));
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    assert_eq!(engine.balance_of("maria").unwrap().cents(), 20_000);
}
