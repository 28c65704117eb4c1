use std::sync::Arc;

use fmp_common::Cents;
use fmp_engine::{
    db_types::{Actor, DeliveryAddress, NewOrder, OrderId, OrderItem, OrderStatusType, PaymentStatusType, ReservationState},
    order_objects::{CheckoutRequest, OrderQueryFilter},
    test_utils::prepare_env::seed_product,
    traits::{CatalogManagement, ErrorKind, InventoryManagement, MarketError, OrderManagement},
};
use support::{pid, place_order, request, setup, tear_down};

mod support;

#[tokio::test]
async fn checkout_takes_stock_and_empties_the_cart() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 2).await;
    seed_product(&market.db, "B", "ginny", 500, 1).await;

    let order = place_order(&market, "alice", &[("A", 2), ("B", 1)]).await;
    assert_eq!(order.total_amount, Cents::from(1100));
    assert_eq!(order.total_amount.to_string(), "11.00");
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.payment_status, PaymentStatusType::Pending);
    assert_eq!(order.buyer_id, "alice");
    assert_eq!(order.currency, "usd");
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].unit_price, Cents::from(300));
    assert_eq!(order.items[0].quantity, 2);
    assert_eq!(order.items[1].farmer_id, "ginny");
    assert!(order.payment_intent_ref.is_none());

    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 0);
    assert_eq!(market.inventory.stock_level(&pid("B")).await.unwrap(), 0);
    let a = market.db.fetch_product(&pid("A")).await.unwrap().unwrap();
    assert_eq!(a.units_sold, 2);

    let alice = Actor::customer("alice");
    assert!(market.cart.snapshot(&alice).await.unwrap().is_empty());
    let reservations = market.db.fetch_reservations(order.order_id.as_str()).await.unwrap();
    assert_eq!(reservations.len(), 2);
    assert!(reservations.iter().all(|r| r.state == ReservationState::Committed));

    let stored = market.orders.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(stored, order);

    let err = market.checkout.checkout(&alice, request()).await.unwrap_err();
    assert!(matches!(err, MarketError::EmptyCart));
    tear_down(market).await;
}

#[tokio::test]
async fn failed_reservation_is_compensated() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 5).await;
    seed_product(&market.db, "B", "ginny", 500, 1).await;
    let alice = Actor::customer("alice");
    market.cart.add_line(&alice, &pid("A"), 2).await.unwrap();
    market.cart.add_line(&alice, &pid("B"), 3).await.unwrap();

    let err = market.checkout.checkout(&alice, request()).await.unwrap_err();
    match err {
        MarketError::InsufficientStock { product_id, requested, available } => {
            assert_eq!(product_id, pid("B"));
            assert_eq!(requested, 3);
            assert_eq!(available, 1);
        },
        e => panic!("Unexpected error: {e}"),
    }
    // Nothing moved
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 5);
    assert_eq!(market.inventory.stock_level(&pid("B")).await.unwrap(), 1);
    assert_eq!(market.cart.snapshot(&alice).await.unwrap().lines.len(), 2);
    let orders = market.orders.orders_for(&alice, OrderQueryFilter::default()).await.unwrap();
    assert!(orders.is_empty());
    let a = market.db.fetch_product(&pid("A")).await.unwrap().unwrap();
    assert_eq!(a.units_sold, 0);
    tear_down(market).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_unit_goes_to_exactly_one_buyer() {
    let market = Arc::new(setup().await);
    seed_product(&market.db, "truffle", "fred", 5000, 1).await;
    let alice = Actor::customer("alice");
    let bob = Actor::customer("bob");
    market.cart.add_line(&alice, &pid("truffle"), 1).await.unwrap();
    market.cart.add_line(&bob, &pid("truffle"), 1).await.unwrap();

    let m1 = Arc::clone(&market);
    let m2 = Arc::clone(&market);
    let t1 = tokio::spawn(async move { m1.checkout.checkout(&alice, request()).await });
    let t2 = tokio::spawn(async move { m2.checkout.checkout(&bob, request()).await });
    let results = [t1.await.unwrap(), t2.await.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).expect("One checkout must fail");
    assert!(matches!(loser, MarketError::InsufficientStock { available: 0, .. }), "Unexpected error: {loser}");
    assert_eq!(market.inventory.stock_level(&pid("truffle")).await.unwrap(), 0);
    let market = Arc::into_inner(market).expect("All tasks are finished");
    tear_down(market).await;
}

#[tokio::test]
async fn checkout_request_is_validated() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 5).await;
    let alice = Actor::customer("alice");

    let err = market.checkout.checkout(&alice, request()).await.unwrap_err();
    assert!(matches!(err, MarketError::EmptyCart));
    assert_eq!(err.kind(), ErrorKind::Validation);

    market.cart.add_line(&alice, &pid("A"), 1).await.unwrap();
    let mut address = support::address();
    address.zip_code = String::new();
    let err = market.checkout.checkout(&alice, CheckoutRequest::new(address, "card")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("zip_code"));

    let err = market.checkout.checkout(&alice, CheckoutRequest::new(support::address(), " ")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = market.checkout.checkout(&Actor::farmer("fred"), request()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // None of the rejected attempts touched stock
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 5);
    let order = market.checkout.checkout(&alice, request().with_notes("Leave by the gate")).await.unwrap();
    assert_eq!(order.notes.as_deref(), Some("Leave by the gate"));
    assert_eq!(order.delivery_address, support::address());
    tear_down(market).await;
}

#[tokio::test]
async fn expired_reservations_cannot_be_committed() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 3).await;
    let order_id = OrderId::random();
    market.db.reserve_stock(order_id.as_str(), &pid("A"), 2).await.unwrap();
    // The repair worker got there first
    market.db.release_reservations(order_id.as_str()).await.unwrap();

    let item = OrderItem {
        product_id: pid("A"),
        product_name: "A".into(),
        farmer_id: "fred".into(),
        quantity: 2,
        unit_price: Cents::from(300),
    };
    let order = NewOrder::new(order_id.clone(), "alice", vec![item], DeliveryAddress::default(), "card");
    let err = market.db.place_order(order).await.unwrap_err();
    assert!(matches!(err, MarketError::CheckoutExpired(_)));
    assert!(market.db.fetch_order(&order_id).await.unwrap().is_none());
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 3);
    tear_down(market).await;
}

#[tokio::test]
async fn order_history_survives_catalog_changes() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", 300, 3).await;
    let order = place_order(&market, "alice", &[("A", 1)]).await;

    assert!(market.db.delete_product(&pid("A")).await.unwrap());
    let stored = market.orders.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(stored.items[0].product_name, "Product A");
    assert_eq!(stored.items[0].unit_price, Cents::from(300));
    assert_eq!(stored.total_amount, Cents::from(300));
    tear_down(market).await;
}

#[tokio::test]
async fn oversized_totals_are_rejected_before_reserving() {
    let market = setup().await;
    seed_product(&market.db, "A", "fred", i64::MAX / 2, 5).await;
    let alice = Actor::customer("alice");
    market.cart.add_line(&alice, &pid("A"), 3).await.unwrap();
    assert!(market.cart.snapshot(&alice).await.unwrap().total().is_none());

    let err = market.checkout.checkout(&alice, request()).await.unwrap_err();
    assert!(matches!(err, MarketError::ValidationError(_)));
    assert_eq!(market.inventory.stock_level(&pid("A")).await.unwrap(), 5);
    assert_eq!(market.cart.snapshot(&alice).await.unwrap().lines.len(), 1);
    let orders = market.db.search_orders(OrderQueryFilter::default().with_buyer_id("alice".into())).await.unwrap();
    assert!(orders.is_empty());
    tear_down(market).await;
}
