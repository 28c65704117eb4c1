#![allow(dead_code)]
use fmp_engine::{
    db_types::{Actor, DeliveryAddress, Order, ProductId},
    events::EventProducers,
    order_objects::CheckoutRequest,
    test_utils::{
        mock_gateway::MockGateway,
        prepare_env::{prepare_test_env, random_db_path},
    },
    CartApi,
    CheckoutApi,
    InventoryApi,
    OrderApi,
    PaymentApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub struct Market {
    pub url: String,
    pub db: SqliteDatabase,
    pub gateway: MockGateway,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub cart: CartApi<SqliteDatabase>,
    pub orders: OrderApi<SqliteDatabase>,
    pub payments: PaymentApi<SqliteDatabase, MockGateway>,
    pub checkout: CheckoutApi<SqliteDatabase>,
}

pub async fn setup() -> Market {
    setup_with_producers(EventProducers::default()).await
}

pub async fn setup_with_producers(producers: EventProducers) -> Market {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let gateway = MockGateway::new();
    Market {
        url,
        inventory: InventoryApi::new(db.clone()),
        cart: CartApi::new(db.clone()),
        orders: OrderApi::new(db.clone(), producers.clone()),
        payments: PaymentApi::new(db.clone(), gateway.clone(), producers.clone()),
        checkout: CheckoutApi::new(db.clone(), producers),
        gateway,
        db,
    }
}

pub async fn tear_down(market: Market) {
    let Market { url, db, .. } = market;
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🚀️ Could not drop test database {url}: {e}");
    }
}

pub fn address() -> DeliveryAddress {
    DeliveryAddress::new("12 Orchard Lane", "Hood River", "OR", "97031", "US")
}

pub fn request() -> CheckoutRequest {
    CheckoutRequest::new(address(), "card")
}

pub fn pid(id: &str) -> ProductId {
    ProductId::from(id)
}

/// Fills the buyer's cart with `lines` and checks out.
pub async fn place_order(market: &Market, buyer: &str, lines: &[(&str, i64)]) -> Order {
    let actor = Actor::customer(buyer);
    for (product, quantity) in lines {
        market.cart.add_line(&actor, &pid(product), *quantity).await.expect("Error adding cart line");
    }
    market.checkout.checkout(&actor, request()).await.expect("Error checking out")
}
