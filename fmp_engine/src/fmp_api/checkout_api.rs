use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, NewOrder, Order, OrderId, OrderItem, Role},
    events::{EventProducers, NotificationEvent, OrderCreatedEvent},
    order_objects::CheckoutRequest,
    traits::{CartManagement, InventoryManagement, MarketError, OrderManagement},
};

/// `CheckoutApi` turns a buyer's cart into an order.
///
/// Checkout is a saga over the inventory ledger and the order store:
/// 1. The cart is priced against the catalog.
/// 2. Stock for every line is reserved, one line at a time, under the id of the order being created.
/// 3. The order is written, the reservations committed and the cart emptied, all in one transaction.
///
/// If any step fails, every reservation taken so far is released before the error is returned. Should the release
/// itself fail, the reservations stay `held` and the repair worker returns the stock once they go stale.
pub struct CheckoutApi<B> {
    db: B,
    producers: EventProducers,
    currency: String,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({})", self.currency)
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, currency: fmp_common::DEFAULT_CURRENCY_CODE.to_string() }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }
}

impl<B> CheckoutApi<B>
where B: CartManagement + InventoryManagement + OrderManagement
{
    /// Places an order for everything in the actor's cart.
    ///
    /// On success, the stock for every line has been taken, the order exists with status `pending`, and the cart is
    /// empty. On failure, none of these have happened.
    ///
    /// ## Failure modes:
    /// - `PermissionDenied` if the actor is not a customer.
    /// - `ValidationError` if the delivery address or payment method is incomplete.
    /// - `EmptyCart` if there is nothing to order.
    /// - `ValidationError` if the order total is too large to represent. No stock is reserved in this case.
    /// - `InsufficientStock` or `ProductNotFound` if a line cannot be reserved.
    /// - `CheckoutExpired` if the reservations were reclaimed by the repair worker before the order was written.
    /// - `CompensationPending` if the checkout failed and its stock could not be returned immediately.
    pub async fn checkout(&self, actor: &Actor, request: CheckoutRequest) -> Result<Order, MarketError> {
        if actor.role != Role::Customer {
            return Err(MarketError::PermissionDenied(format!("{actor} cannot check out")));
        }
        validate_request(&request)?;
        let buyer_id = actor.subject_id.as_str();
        let lines = self.db.fetch_cart_snapshot(buyer_id).await?;
        if lines.is_empty() {
            return Err(MarketError::EmptyCart);
        }
        let order_id = OrderId::random();
        let checkout_id = order_id.as_str().to_string();
        let checkout_id = checkout_id.as_str();
        let items = lines.into_iter().map(OrderItem::from).collect::<Vec<_>>();
        let CheckoutRequest { delivery_address, payment_method, notes } = request;
        let new_order = NewOrder::new(order_id, buyer_id, items, delivery_address, payment_method.as_str())
            .with_currency(self.currency.as_str())
            .with_notes(notes);
        // Priced before any stock is touched, so an unrepresentable total leaves nothing to undo
        let total = new_order.total_amount()?;
        debug!("🛒️ Checkout {checkout_id} started for {buyer_id} with {} line(s), {total}", new_order.items.len());

        for item in &new_order.items {
            if let Err(e) = self.db.reserve_stock(checkout_id, &item.product_id, item.quantity).await {
                info!("🛒️ Checkout {checkout_id} could not reserve {} x {}: {e}", item.quantity, item.product_id);
                return Err(self.compensate(checkout_id, e).await);
            }
        }

        let order = match self.db.place_order(new_order).await {
            Ok(order) => order,
            Err(e) => {
                warn!("🛒️ Checkout {checkout_id} could not write its order: {e}");
                return Err(self.compensate(checkout_id, e).await);
            },
        };
        info!("🛒️ Order {} placed by {buyer_id} for {} {}", order.order_id, order.total_amount, order.currency);
        self.producers.publish_order_created(OrderCreatedEvent::new(order.clone()));
        for notification in NotificationEvent::for_new_order(&order) {
            self.producers.publish_notification(notification);
        }
        Ok(order)
    }

    /// Returns every reservation still held by the checkout. Yields the error the caller should report: the original
    /// one if the stock went back, or `CompensationPending` if it did not.
    async fn compensate(&self, checkout_id: &str, cause: MarketError) -> MarketError {
        match self.db.release_reservations(checkout_id).await {
            Ok(released) => {
                if !released.is_empty() {
                    debug!("🛒️ Checkout {checkout_id} released {} reservation(s)", released.len());
                }
                cause
            },
            Err(e) => {
                error!(
                    "🛒️ Checkout {checkout_id} failed ({cause}) and its reservations could not be released: {e}. The \
                     repair worker will return the stock."
                );
                MarketError::CompensationPending { checkout_id: checkout_id.to_string(), reason: cause.to_string() }
            },
        }
    }
}

fn validate_request(request: &CheckoutRequest) -> Result<(), MarketError> {
    let missing = request.delivery_address.missing_fields();
    if !missing.is_empty() {
        return Err(MarketError::ValidationError(format!("Delivery address is missing: {}", missing.join(", "))));
    }
    if request.payment_method.trim().is_empty() {
        return Err(MarketError::ValidationError("A payment method is required".into()));
    }
    Ok(())
}
