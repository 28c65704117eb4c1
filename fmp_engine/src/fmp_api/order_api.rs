use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, Order, OrderId, OrderStatusType, PaymentStatusType, Role},
    events::{EventProducers, NotificationEvent, OrderStatusChangedEvent},
    order_objects::OrderQueryFilter,
    traits::{MarketError, OrderManagement, StatusChange},
};

/// How many times a status change is retried when the order moves underneath it.
pub(crate) const MAX_CAS_ATTEMPTS: usize = 3;

/// `OrderApi` is the order store's public face. It enforces the order lifecycle and who may drive each edge of it.
pub struct OrderApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderApi")
    }
}

impl<B> OrderApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderApi<B>
where B: OrderManagement
{
    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| MarketError::OrderNotFound(order_id.clone()))
    }

    /// Fetches an order on behalf of `actor`. Buyers see their own orders, farmers see orders containing their
    /// products, and admins see everything.
    pub async fn fetch_order_for(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, MarketError> {
        let order = self.fetch_order(order_id).await?;
        let allowed = match actor.role {
            Role::Admin | Role::System => true,
            Role::Customer => order.buyer_id == actor.subject_id,
            Role::Farmer => order.involves_farmer(&actor.subject_id),
        };
        if allowed {
            Ok(order)
        } else {
            Err(MarketError::PermissionDenied(format!("{actor} may not view order {order_id}")))
        }
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, MarketError> {
        self.db.search_orders(query).await
    }

    /// Lists the orders visible to `actor`, further narrowed by `query`. The role-based restriction always wins over
    /// whatever buyer or farmer the query asks for.
    pub async fn orders_for(&self, actor: &Actor, query: OrderQueryFilter) -> Result<Vec<Order>, MarketError> {
        let scope = OrderQueryFilter::for_actor(actor);
        let query = OrderQueryFilter {
            buyer_id: scope.buyer_id.or(query.buyer_id),
            farmer_id: scope.farmer_id.or(query.farmer_id),
            ..query
        };
        self.db.search_orders(query).await
    }

    /// Moves an order to `new_status` on behalf of `actor`.
    ///
    /// The change is applied with a compare-and-set on the current status, so two callers racing to change the same
    /// order can never both succeed from the same starting state. If the order moves on concurrently, the request is
    /// re-validated against the new state.
    ///
    /// ## Failure modes:
    /// - `OrderNotFound` if the order does not exist.
    /// - `InvalidTransition` if the lifecycle does not allow the change from the current status.
    /// - `PermissionDenied` if the actor may not drive this edge.
    pub async fn transition_status(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        new_status: OrderStatusType,
    ) -> Result<Order, MarketError> {
        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let order = self.fetch_order(order_id).await?;
            let old_status = order.status;
            if !old_status.can_transition_to(new_status) {
                debug!("📦️ Rejected {old_status} -> {new_status} for order {order_id}");
                return Err(MarketError::InvalidTransition { from: old_status, to: new_status });
            }
            check_transition_permission(actor, &order, new_status)?;
            let mut change =
                StatusChange::to(new_status).from_status(old_status).with_expected_payment_status(order.payment_status);
            // A cancelled order is never left marked as paid
            if new_status == OrderStatusType::Cancelled && order.payment_status == PaymentStatusType::Completed {
                warn!("📦️ Order {order_id} is being cancelled after payment. Refund it at the payment gateway.");
                change = change.with_payment_status(PaymentStatusType::Failed);
            }
            match self.db.compare_and_set_status(order_id, change).await? {
                Some(updated) => {
                    info!("📦️ Order {order_id} moved from {old_status} to {new_status} by {actor}");
                    self.notify_status_changed(&order, &updated, actor.clone());
                    return Ok(updated);
                },
                None => {
                    debug!("📦️ Order {order_id} changed while moving to {new_status} (attempt {attempt}). Retrying.");
                },
            }
        }
        warn!("📦️ Gave up moving order {order_id} to {new_status} after {MAX_CAS_ATTEMPTS} attempts");
        Err(MarketError::ContentionLimitReached(order_id.clone()))
    }

    /// Convenience wrapper for cancelling an order. Cancellation returns the order's stock to the ledger. A paid order
    /// has its payment status set to `failed`, since `completed` only ever describes a live order.
    pub async fn cancel(&self, actor: &Actor, order_id: &OrderId) -> Result<Order, MarketError> {
        self.transition_status(actor, order_id, OrderStatusType::Cancelled).await
    }

    /// Associates a gateway payment intent with the order. Rebinding the same intent is a no-op.
    ///
    /// ## Failure modes:
    /// - `OrderNotFound` if the order does not exist.
    /// - `IntentAlreadyBound` if the order already carries a different intent.
    /// - `IntentInUse` if the intent belongs to another order.
    pub async fn attach_payment_intent(&self, order_id: &OrderId, intent_ref: &str) -> Result<Order, MarketError> {
        if intent_ref.trim().is_empty() {
            return Err(MarketError::ValidationError("Payment intent reference cannot be empty".into()));
        }
        let order = self
            .db
            .bind_payment_intent(order_id, intent_ref)
            .await?
            .ok_or_else(|| MarketError::OrderNotFound(order_id.clone()))?;
        debug!("📦️ Order {order_id} bound to payment intent {intent_ref}");
        Ok(order)
    }

    /// Records the delivery tracking number for an order that is being prepared or is on its way.
    pub async fn set_tracking_number(
        &self,
        actor: &Actor,
        order_id: &OrderId,
        tracking_number: &str,
    ) -> Result<Order, MarketError> {
        if tracking_number.trim().is_empty() {
            return Err(MarketError::ValidationError("Tracking number cannot be empty".into()));
        }
        let order = self.fetch_order(order_id).await?;
        if !is_fulfiller(actor, &order) {
            return Err(MarketError::PermissionDenied(format!("{actor} may not ship order {order_id}")));
        }
        check_trackable(&order)?;
        // The write is conditional on the status, so a concurrent delivery or cancellation wins
        let order = match self.db.set_tracking_number(order_id, tracking_number).await? {
            Some(order) => order,
            None => {
                let current = self.fetch_order(order_id).await?;
                check_trackable(&current)?;
                return Err(MarketError::ContentionLimitReached(order_id.clone()));
            },
        };
        debug!("📦️ Tracking number for order {order_id} set by {actor}");
        Ok(order)
    }

    fn notify_status_changed(&self, old: &Order, new: &Order, by: Actor) {
        let event = OrderStatusChangedEvent::new(new.clone(), old.status, old.payment_status, by);
        self.producers.publish_status_changed(event);
        self.producers.publish_notification(NotificationEvent::status_changed(new, old.status));
    }
}

fn check_trackable(order: &Order) -> Result<(), MarketError> {
    use OrderStatusType::*;
    if matches!(order.status, Preparing | Ready | OutForDelivery) {
        Ok(())
    } else {
        Err(MarketError::ValidationError(format!(
            "A tracking number can only be set once fulfilment has started and before delivery. Order {} is {}",
            order.order_id, order.status
        )))
    }
}

/// Farmers with an item in the order, as well as admins and the system, may run fulfilment.
fn is_fulfiller(actor: &Actor, order: &Order) -> bool {
    match actor.role {
        Role::Admin | Role::System => true,
        Role::Farmer => order.involves_farmer(&actor.subject_id),
        Role::Customer => false,
    }
}

/// Decides whether `actor` may move `order` to `new_status`. The edge itself must already be known to be legal.
pub(crate) fn check_transition_permission(
    actor: &Actor,
    order: &Order,
    new_status: OrderStatusType,
) -> Result<(), MarketError> {
    use OrderStatusType::*;
    let allowed = match (order.status, new_status) {
        // Payment driven edges belong to the reconciler
        (Pending, Confirmed) | (Pending, PaymentFailed) | (PaymentFailed, Pending) => actor.role == Role::System,
        (_, Preparing) | (_, Ready) | (_, OutForDelivery) | (_, Delivered) => is_fulfiller(actor, order),
        (from, Cancelled) => match actor.role {
            Role::Customer => order.buyer_id == actor.subject_id && matches!(from, Pending | PaymentFailed),
            _ => is_fulfiller(actor, order),
        },
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(MarketError::PermissionDenied(format!(
            "{actor} may not move order {} from {} to {new_status}",
            order.order_id, order.status
        )))
    }
}
