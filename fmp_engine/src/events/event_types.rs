use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::db_types::{Actor, Order, OrderStatusType, PaymentStatusType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub order: Order,
    pub old_status: OrderStatusType,
    pub old_payment_status: PaymentStatusType,
    /// The caller that drove the change. Payment driven changes are made by the system actor.
    pub changed_by: Actor,
}

impl OrderStatusChangedEvent {
    pub fn new(order: Order, old_status: OrderStatusType, old_payment_status: PaymentStatusType, by: Actor) -> Self {
        Self { order, old_status, old_payment_status, changed_by: by }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Sent to each farmer with items in a new order.
    NewOrder,
    /// Sent to the buyer when their order is placed.
    OrderPlaced,
    PaymentConfirmed,
    PaymentFailed,
    OrderStatusChanged,
}

/// A message for a single recipient. The engine only produces these; delivery (email, push, in-app) is up to whoever
/// subscribes to the notification hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub recipient: String,
    pub kind: NotificationKind,
    pub payload: Value,
}

impl NotificationEvent {
    pub fn new<S: Into<String>>(recipient: S, kind: NotificationKind, payload: Value) -> Self {
        Self { recipient: recipient.into(), kind, payload }
    }

    /// One `NewOrder` notification per farmer with items in the order, plus an `OrderPlaced` confirmation for the
    /// buyer.
    pub fn for_new_order(order: &Order) -> Vec<Self> {
        let mut result = order
            .farmer_ids()
            .into_iter()
            .map(|farmer_id| {
                let items = order.items.iter().filter(|i| i.farmer_id == farmer_id).collect::<Vec<_>>();
                let payload = json!({
                    "order_id": order.order_id.as_str(),
                    "buyer_id": order.buyer_id,
                    "items": items,
                });
                Self::new(farmer_id, NotificationKind::NewOrder, payload)
            })
            .collect::<Vec<_>>();
        let payload = json!({
            "order_id": order.order_id.as_str(),
            "total_amount": order.total_amount,
            "currency": order.currency,
        });
        result.push(Self::new(order.buyer_id.clone(), NotificationKind::OrderPlaced, payload));
        result
    }

    pub fn payment_update(order: &Order, kind: NotificationKind) -> Self {
        let payload = json!({
            "order_id": order.order_id.as_str(),
            "status": order.status,
            "payment_status": order.payment_status,
            "total_amount": order.total_amount,
        });
        Self::new(order.buyer_id.clone(), kind, payload)
    }

    pub fn status_changed(order: &Order, old_status: OrderStatusType) -> Self {
        let payload = json!({
            "order_id": order.order_id.as_str(),
            "old_status": old_status,
            "status": order.status,
            "tracking_number": order.tracking_number,
        });
        Self::new(order.buyer_id.clone(), NotificationKind::OrderStatusChanged, payload)
    }
}
