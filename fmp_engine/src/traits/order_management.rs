use crate::{
    db_types::{NewOrder, Order, OrderId},
    order_objects::OrderQueryFilter,
    traits::{data_objects::StatusChange, MarketError},
};

/// The order store.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Turns a checkout into an order in a single atomic transaction:
    /// * every held reservation of the checkout (keyed on `order.order_id`) is marked as committed. If the held
    ///   reservations do not cover every item exactly, nothing is written and `CheckoutExpired` is returned.
    /// * `units_sold` is incremented for each product.
    /// * the order and its items are stored with status `pending` and payment status `pending`.
    /// * the buyer's cart is emptied.
    async fn place_order(&self, order: NewOrder) -> Result<Order, MarketError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, MarketError>;

    async fn fetch_order_by_intent(&self, intent_ref: &str) -> Result<Option<Order>, MarketError>;

    /// Fetches orders according to the criteria in the filter, newest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketError>;

    /// Applies the status change if, and only if, the order currently matches the expected state. Returns the updated
    /// order, or `None` if the guard did not match (the order may not exist, or it moved on concurrently).
    ///
    /// When the new status is `cancelled`, the order's committed reservations are released and restocked in the same
    /// transaction.
    async fn compare_and_set_status(&self, order_id: &OrderId, change: StatusChange)
        -> Result<Option<Order>, MarketError>;

    /// Stores `intent_ref` on the order if the order has no intent yet, or already has this same intent.
    /// Returns `None` if the order does not exist.
    ///
    /// ## Failure modes:
    /// - `IntentAlreadyBound` if the order is bound to a different intent.
    /// - `IntentInUse` if another order already uses this intent.
    async fn bind_payment_intent(&self, order_id: &OrderId, intent_ref: &str) -> Result<Option<Order>, MarketError>;

    /// Only applies while the order is `preparing`, `ready` or `out_for_delivery`. Returns `None` if the order does not
    /// exist or is in any other status.
    async fn set_tracking_number(&self, order_id: &OrderId, tracking_number: &str)
        -> Result<Option<Order>, MarketError>;
}
