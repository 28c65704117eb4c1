use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use fmp_engine::{
    db_types::{Actor, OrderStatusType},
    events::{EventHandlers, EventHooks, NotificationKind},
    test_utils::prepare_env::seed_product,
};
use support::{place_order, setup_with_producers, tear_down};

mod support;

#[tokio::test]
async fn hooks_see_every_order_event() {
    let created = Arc::new(AtomicUsize::new(0));
    let changed = Arc::new(Mutex::new(Vec::new()));
    let notified = Arc::new(Mutex::new(Vec::new()));

    let mut hooks = EventHooks::default();
    let counter = Arc::clone(&created);
    hooks.on_order_created(move |ev| {
        let counter = Arc::clone(&counter);
        Box::pin(async move {
            if ev.order.buyer_id == "alice" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
    });
    let log = Arc::clone(&changed);
    hooks.on_status_changed(move |ev| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().unwrap().push((ev.old_status, ev.order.status));
        })
    });
    let log = Arc::clone(&notified);
    hooks.on_notification(move |ev| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().unwrap().push((ev.recipient, ev.kind));
        })
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    let tasks = handlers.start_handlers();

    let market = setup_with_producers(producers).await;
    seed_product(&market.db, "A", "fred", 300, 5).await;
    seed_product(&market.db, "B", "ginny", 500, 5).await;
    let order = place_order(&market, "alice", &[("A", 1), ("B", 1)]).await;
    market.orders.attach_payment_intent(&order.order_id, "pi_1").await.unwrap();
    market.payments.sync_from_gateway_status("pi_1", "succeeded", None).await.unwrap();
    // Replays publish nothing
    market.payments.sync_from_gateway_status("pi_1", "succeeded", None).await.unwrap();
    market.orders.transition_status(&Actor::farmer("fred"), &order.order_id, OrderStatusType::Preparing).await.unwrap();
    tear_down(market).await;

    let mut handled = Vec::new();
    for task in tasks {
        handled.push(task.await.unwrap());
    }
    assert_eq!(handled, vec![1, 2, 5]);
    assert_eq!(created.load(Ordering::SeqCst), 1);

    // Each event runs on its own task, so arrival order is not guaranteed
    let changed = changed.lock().unwrap().clone();
    assert_eq!(changed.len(), 2);
    assert!(changed.contains(&(OrderStatusType::Pending, OrderStatusType::Confirmed)));
    assert!(changed.contains(&(OrderStatusType::Confirmed, OrderStatusType::Preparing)));

    let notified = notified.lock().unwrap().clone();
    assert_eq!(notified.len(), 5);
    for expected in [
        ("alice", NotificationKind::OrderPlaced),
        ("alice", NotificationKind::PaymentConfirmed),
        ("alice", NotificationKind::OrderStatusChanged),
        ("fred", NotificationKind::NewOrder),
        ("ginny", NotificationKind::NewOrder),
    ] {
        assert!(notified.iter().any(|(r, k)| r == expected.0 && *k == expected.1), "Missing {expected:?}");
    }
}
