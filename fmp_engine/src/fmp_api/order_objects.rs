use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Actor, DeliveryAddress, Order, OrderId, OrderStatusType, PaymentStatusType, Role};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<OrderId>,
    pub buyer_id: Option<String>,
    /// Orders containing at least one item owned by this farmer.
    pub farmer_id: Option<String>,
    pub status: Option<Vec<OrderStatusType>>,
    pub payment_status: Option<Vec<PaymentStatusType>>,
    pub has_payment_intent: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    /// Only orders that sort after this `(created_at, order_id)` pair. Used to page through large result sets.
    pub after: Option<(DateTime<Utc>, OrderId)>,
    #[serde(default)]
    pub oldest_first: bool,
}

impl OrderQueryFilter {
    /// The orders an actor is allowed to list: their own for a customer, those with their products for a farmer, and
    /// everything for an admin or the system.
    pub fn for_actor(actor: &Actor) -> Self {
        match actor.role {
            Role::Customer => Self::default().with_buyer_id(actor.subject_id.clone()),
            Role::Farmer => Self::default().with_farmer_id(actor.subject_id.clone()),
            Role::Admin | Role::System => Self::default(),
        }
    }

    pub fn with_order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_buyer_id(mut self, buyer_id: String) -> Self {
        self.buyer_id = Some(buyer_id);
        self
    }

    pub fn with_farmer_id(mut self, farmer_id: String) -> Self {
        self.farmer_id = Some(farmer_id);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatusType) -> Self {
        self.payment_status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn with_payment_intent(mut self, has_intent: bool) -> Self {
        self.has_payment_intent = Some(has_intent);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }

    /// Continues a search after `order`. Only meaningful together with [`Self::oldest_first`].
    pub fn after(mut self, order: &Order) -> Self {
        self.after = Some((order.created_at, order.order_id.clone()));
        self
    }

    /// True if no WHERE criteria are set. The limit is not a criterion.
    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.buyer_id.is_none() &&
            self.farmer_id.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.payment_status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.has_payment_intent.is_none() &&
            self.since.is_none() &&
            self.until.is_none() &&
            self.after.is_none()
    }
}

/// What a buyer submits to turn their cart into an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub delivery_address: DeliveryAddress,
    pub payment_method: String,
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn new<S: Into<String>>(delivery_address: DeliveryAddress, payment_method: S) -> Self {
        Self { delivery_address, payment_method: payment_method.into(), notes: None }
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filter_is_empty() {
        assert!(OrderQueryFilter::default().is_empty());
        assert!(OrderQueryFilter::default().with_limit(5).is_empty());
        assert!(!OrderQueryFilter::default().with_status(OrderStatusType::Pending).is_empty());
        assert!(OrderQueryFilter::for_actor(&Actor::admin("root")).is_empty());
        let f = OrderQueryFilter::for_actor(&Actor::farmer("f1"));
        assert_eq!(f.farmer_id.as_deref(), Some("f1"));
        assert!(f.buyer_id.is_none());
    }
}
