use std::sync::Arc;

use fmp_common::Cents;
use fmp_engine::{
    db_types::Actor,
    test_utils::prepare_env::seed_product,
    traits::{CatalogManagement, ErrorKind, MarketError},
};
use support::{pid, setup, tear_down};

mod support;

#[tokio::test]
async fn adding_a_product_twice_merges_the_line() {
    let market = setup().await;
    seed_product(&market.db, "apples", "fred", 300, 10).await;
    seed_product(&market.db, "beets", "ginny", 500, 10).await;
    let alice = Actor::customer("alice");

    let first = market.cart.add_line(&alice, &pid("apples"), 1).await.unwrap();
    let second = market.cart.add_line(&alice, &pid("apples"), 2).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(second.quantity, 3);
    market.cart.add_line(&alice, &pid("beets"), 1).await.unwrap();

    let cart = market.cart.snapshot(&alice).await.unwrap();
    assert_eq!(cart.lines.len(), 2);
    assert_eq!(cart.lines[0].product_id, pid("apples"));
    assert_eq!(cart.lines[0].unit_price, Cents::from(300));
    assert_eq!(cart.lines[0].farmer_id, "fred");
    assert_eq!(cart.total(), Some(Cents::from(1400)));

    // Carts are per buyer
    let bob = market.cart.snapshot(&Actor::customer("bob")).await.unwrap();
    assert!(bob.is_empty());
    tear_down(market).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_land_on_one_line() {
    let market = Arc::new(setup().await);
    seed_product(&market.db, "plums", "fred", 120, 100).await;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let market = Arc::clone(&market);
        tasks.push(tokio::spawn(async move {
            market.cart.add_line(&Actor::customer("alice"), &pid("plums"), 1).await
        }));
    }
    for task in tasks {
        task.await.unwrap().expect("Error adding line");
    }
    let cart = market.cart.snapshot(&Actor::customer("alice")).await.unwrap();
    assert_eq!(cart.lines.len(), 1);
    assert_eq!(cart.lines[0].quantity, 10);
    let market = Arc::into_inner(market).expect("All tasks are finished");
    tear_down(market).await;
}

#[tokio::test]
async fn update_and_remove_lines() {
    let market = setup().await;
    seed_product(&market.db, "pears", "fred", 200, 10).await;
    let alice = Actor::customer("alice");
    let bob = Actor::customer("bob");

    let line = market.cart.add_line(&alice, &pid("pears"), 1).await.unwrap();
    let line = market.cart.set_quantity(&alice, line.id, 4).await.unwrap().unwrap();
    assert_eq!(line.quantity, 4);

    let err = market.cart.set_quantity(&alice, line.id, -1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    // Bob cannot touch Alice's line
    let err = market.cart.set_quantity(&bob, line.id, 1).await.unwrap_err();
    assert!(matches!(err, MarketError::CartLineNotFound(id) if id == line.id));
    let err = market.cart.remove_line(&bob, line.id).await.unwrap_err();
    assert!(matches!(err, MarketError::CartLineNotFound(_)));

    // A zero quantity removes the line
    assert!(market.cart.set_quantity(&alice, line.id, 0).await.unwrap().is_none());
    assert!(market.cart.snapshot(&alice).await.unwrap().is_empty());
    let err = market.cart.remove_line(&alice, line.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = market.cart.set_quantity(&alice, line.id, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    tear_down(market).await;
}

#[tokio::test]
async fn cart_rules() {
    let market = setup().await;
    seed_product(&market.db, "figs", "fred", 700, 10).await;

    let err = market.cart.add_line(&Actor::farmer("fred"), &pid("figs"), 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let err = market.cart.add_line(&Actor::customer("alice"), &pid("figs"), -2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = market.cart.add_line(&Actor::customer("alice"), &pid("nope"), 1).await.unwrap_err();
    assert!(matches!(err, MarketError::ProductNotFound(_)));

    // Deleting a product drops it from every cart
    let alice = Actor::customer("alice");
    market.cart.add_line(&alice, &pid("figs"), 2).await.unwrap();
    assert!(market.db.delete_product(&pid("figs")).await.unwrap());
    assert!(market.cart.snapshot(&alice).await.unwrap().is_empty());

    assert_eq!(market.cart.clear(&alice).await.unwrap(), 0);
    tear_down(market).await;
}
