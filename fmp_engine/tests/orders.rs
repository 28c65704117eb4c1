use std::sync::Arc;

use fmp_engine::{
    db_types::{Actor, OrderStatusType::*},
    order_objects::OrderQueryFilter,
    test_utils::prepare_env::seed_product,
    traits::{CatalogManagement, ErrorKind, MarketError, OrderManagement},
};
use futures_util::future::join_all;
use support::{pid, place_order, setup, tear_down};

mod support;

#[tokio::test]
async fn full_fulfilment_lifecycle() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 5).await;
    let order = place_order(&market, "alice", &[("A", 2)]).await;
    let id = &order.order_id;
    let fred = Actor::farmer("fred");

    let order = market.orders.transition_status(&Actor::system(), id, Confirmed).await.unwrap();
    assert_eq!(order.status, Confirmed);
    let order = market.orders.transition_status(&fred, id, Preparing).await.unwrap();
    assert_eq!(order.status, Preparing);
    let order = market.orders.transition_status(&fred, id, Ready).await.unwrap();
    assert_eq!(order.status, Ready);
    let order = market.orders.set_tracking_number(&fred, id, "1Z999AA10123456784").await.unwrap();
    assert_eq!(order.tracking_number.as_deref(), Some("1Z999AA10123456784"));
    let order = market.orders.transition_status(&fred, id, OutForDelivery).await.unwrap();
    assert_eq!(order.status, OutForDelivery);
    assert_eq!(order.tracking_number.as_deref(), Some("1Z999AA10123456784"));
    assert_eq!(order.items.len(), 1);
    let order = market.orders.transition_status(&Actor::admin("root"), id, Delivered).await.unwrap();
    assert_eq!(order.status, Delivered);

    for next in [Pending, Confirmed, Preparing, Ready, OutForDelivery, Cancelled, PaymentFailed] {
        let err = market.orders.transition_status(&Actor::admin("root"), id, next).await.unwrap_err();
        assert!(matches!(err, MarketError::InvalidTransition { from: Delivered, .. }), "Unexpected error: {err}");
    }
    tear_down(market).await;
}

#[tokio::test]
async fn illegal_edges_are_rejected() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 5).await;
    let order = place_order(&market, "alice", &[("A", 1)]).await;
    let id = &order.order_id;

    let err = market.orders.transition_status(&Actor::farmer("fred"), id, Preparing).await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidTransition { from: Pending, to: Preparing }));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    let err = market.orders.transition_status(&Actor::admin("root"), id, OutForDelivery).await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidTransition { .. }));

    // Payment edges belong to the system
    let err = market.orders.transition_status(&Actor::admin("root"), id, Confirmed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = market.orders.transition_status(&Actor::customer("alice"), id, Confirmed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    market.orders.transition_status(&Actor::system(), id, Confirmed).await.unwrap();
    let err = market.orders.transition_status(&Actor::farmer("ginny"), id, Preparing).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = market.orders.set_tracking_number(&Actor::farmer("fred"), id, "TRACK").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = market.orders.transition_status(&Actor::system(), &"missing".into(), Confirmed).await.unwrap_err();
    assert!(matches!(err, MarketError::OrderNotFound(_)));
    tear_down(market).await;
}

#[tokio::test]
async fn cancellation_returns_stock() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 5).await;
    let order = place_order(&market, "alice", &[("A", 3)]).await;
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 2);

    let err = market.orders.cancel(&Actor::customer("bob"), &order.order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    let cancelled = market.orders.cancel(&Actor::customer("alice"), &order.order_id).await.unwrap();
    assert_eq!(cancelled.status, Cancelled);
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 5);

    let err = market.orders.cancel(&Actor::admin("root"), &order.order_id).await.unwrap_err();
    assert!(matches!(err, MarketError::InvalidTransition { from: Cancelled, to: Cancelled }));
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 5);
    // Sales figures are not rewound by a cancellation
    let a = market.db.fetch_product(&pid("A")).await.unwrap().unwrap();
    assert_eq!(a.units_sold, 3);
    tear_down(market).await;
}

#[tokio::test]
async fn buyers_cannot_cancel_confirmed_orders() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 5).await;
    let order = place_order(&market, "alice", &[("A", 1)]).await;
    market.orders.transition_status(&Actor::system(), &order.order_id, Confirmed).await.unwrap();

    let err = market.orders.cancel(&Actor::customer("alice"), &order.order_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let order = market.orders.cancel(&Actor::farmer("fred"), &order.order_id).await.unwrap();
    assert_eq!(order.status, Cancelled);
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 5);
    tear_down(market).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_cancellations_restock_once() {
    let market = Arc::new(setup().await);
    seed_product(&market.db, "A", "fred", 300, 4).await;
    let order = place_order(&market, "alice", &[("A", 4)]).await;

    let mut tasks = Vec::new();
    for i in 0..5 {
        let market = Arc::clone(&market);
        let id = order.order_id.clone();
        tasks.push(tokio::spawn(async move { market.orders.cancel(&Actor::admin(format!("admin{i}")), &id).await }));
    }
    let mut succeeded = 0;
    for result in join_all(tasks).await {
        match result.unwrap() {
            Ok(_) => succeeded += 1,
            Err(e) => assert!(matches!(e, MarketError::InvalidTransition { .. }), "Unexpected error: {e}"),
        }
    }
    assert_eq!(succeeded, 1);
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 4);
    let market = Arc::into_inner(market).expect("All tasks are finished");
    tear_down(market).await;
}

#[tokio::test]
async fn order_visibility_follows_role() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 10).await;
    seed_product(&market.db, "B", "ginny", 500, 10).await;
    let o1 = place_order(&market, "alice", &[("A", 1)]).await;
    let o2 = place_order(&market, "alice", &[("B", 1)]).await;
    let o3 = place_order(&market, "bob", &[("A", 1), ("B", 1)]).await;

    let all = OrderQueryFilter::default();
    let alice = market.orders.orders_for(&Actor::customer("alice"), all.clone()).await.unwrap();
    assert_eq!(alice.len(), 2);
    assert!(alice.iter().all(|o| o.buyer_id == "alice"));
    // A buyer cannot widen their view by asking for someone else's orders
    let sneaky = all.clone().with_buyer_id("bob".into());
    let alice = market.orders.orders_for(&Actor::customer("alice"), sneaky).await.unwrap();
    assert!(alice.iter().all(|o| o.buyer_id == "alice"));

    let fred = market.orders.orders_for(&Actor::farmer("fred"), all.clone()).await.unwrap();
    let mut ids = fred.iter().map(|o| o.order_id.clone()).collect::<Vec<_>>();
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    let mut expected = vec![o1.order_id.clone(), o3.order_id.clone()];
    expected.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(ids, expected);
    // Items of other farmers are still part of the order
    let bobs = fred.iter().find(|o| o.order_id == o3.order_id).unwrap();
    assert_eq!(bobs.items.len(), 2);

    let admin = market.orders.orders_for(&Actor::admin("root"), all.clone()).await.unwrap();
    assert_eq!(admin.len(), 3);
    let limited = market.orders.search_orders(all.with_limit(2)).await.unwrap();
    assert_eq!(limited.len(), 2);

    assert!(market.orders.fetch_order_for(&Actor::customer("bob"), &o2.order_id).await.is_err());
    assert!(market.orders.fetch_order_for(&Actor::farmer("fred"), &o2.order_id).await.is_err());
    assert!(market.orders.fetch_order_for(&Actor::farmer("ginny"), &o2.order_id).await.is_ok());
    assert!(market.orders.fetch_order_for(&Actor::customer("alice"), &o2.order_id).await.is_ok());
    tear_down(market).await;
}

#[tokio::test]
async fn payment_intents_bind_once() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 10).await;
    let o1 = place_order(&market, "alice", &[("A", 1)]).await;
    let o2 = place_order(&market, "bob", &[("A", 1)]).await;

    let bound = market.orders.attach_payment_intent(&o1.order_id, "pi_1").await.unwrap();
    assert_eq!(bound.payment_intent_ref.as_deref(), Some("pi_1"));
    // Rebinding the same intent is harmless
    market.orders.attach_payment_intent(&o1.order_id, "pi_1").await.unwrap();

    let err = market.orders.attach_payment_intent(&o1.order_id, "pi_2").await.unwrap_err();
    match err {
        MarketError::IntentAlreadyBound { existing, .. } => assert_eq!(existing, "pi_1"),
        e => panic!("Unexpected error: {e}"),
    }
    let err = market.orders.attach_payment_intent(&o2.order_id, "pi_1").await.unwrap_err();
    assert!(matches!(err, MarketError::IntentInUse(_)));
    let err = market.orders.attach_payment_intent(&"missing".into(), "pi_3").await.unwrap_err();
    assert!(matches!(err, MarketError::OrderNotFound(_)));
    tear_down(market).await;
}

#[tokio::test]
async fn tracking_numbers_stop_at_delivery() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 5).await;
    let order = place_order(&market, "alice", &[("A", 1)]).await;
    let id = &order.order_id;
    let fred = Actor::farmer("fred");
    market.orders.transition_status(&Actor::system(), id, Confirmed).await.unwrap();
    market.orders.transition_status(&fred, id, Preparing).await.unwrap();
    market.orders.set_tracking_number(&fred, id, "TRACK-1").await.unwrap();
    market.orders.transition_status(&fred, id, Ready).await.unwrap();
    market.orders.transition_status(&fred, id, OutForDelivery).await.unwrap();
    market.orders.transition_status(&fred, id, Delivered).await.unwrap();

    // The write itself refuses orders outside fulfilment, whatever the caller checked beforehand
    assert!(market.db.set_tracking_number(id, "TRACK-2").await.unwrap().is_none());
    let err = market.orders.set_tracking_number(&fred, id, "TRACK-2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let stored = market.orders.fetch_order(id).await.unwrap();
    assert_eq!(stored.tracking_number.as_deref(), Some("TRACK-1"));
    assert!(market.db.set_tracking_number(&"missing".into(), "TRACK-3").await.unwrap().is_none());
    tear_down(market).await;
}
