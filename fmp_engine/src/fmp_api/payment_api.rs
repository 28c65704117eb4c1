use std::fmt::Debug;

use fmp_common::Cents;
use log::*;

use crate::{
    db_types::{Actor, Order, OrderId, OrderStatusType, PaymentEventOutcome, PaymentStatusType, Role},
    events::{EventProducers, NotificationEvent, NotificationKind, OrderStatusChangedEvent},
    fmp_api::order_api::MAX_CAS_ATTEMPTS,
    order_objects::OrderQueryFilter,
    payment_objects::{
        is_reachable,
        GatewayStatus,
        NoOpReason,
        PaymentIntentResponse,
        PaymentStatusReport,
        ReconcileOutcome,
    },
    traits::{GatewayIntent, MarketError, OrderManagement, PaymentGateway, PaymentRecords, StatusChange},
};

/// `PaymentApi` keeps orders in step with the card payment gateway.
///
/// Gateway notifications can arrive late, more than once, or out of order. The reconciler only ever applies a
/// notification if it moves the order forward, and does so with a compare-and-set on the order's
/// `(status, payment_status)` pair, so replays and stragglers are harmless.
pub struct PaymentApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for PaymentApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentApi")
    }
}

impl<B, G> PaymentApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, G> PaymentApi<B, G>
where
    B: OrderManagement + PaymentRecords,
    G: PaymentGateway,
{
    /// Applies a gateway status notification to the order bound to `intent_ref`.
    ///
    /// If `amount` is given, it must equal the order total. Every notification is written to the payment event log
    /// along with what the reconciler did with it. The local copy of the intent takes the reported status, unless the
    /// notification was stale.
    ///
    /// ## Failure modes:
    /// - `PaymentIntentNotFound` if no order is bound to the intent.
    /// - `AmountMismatch` if the reported amount differs from the order total. The order is left unchanged.
    /// - `ContentionLimitReached` if the order kept changing underneath the update.
    pub async fn sync_from_gateway_status(
        &self,
        intent_ref: &str,
        gateway_status: &str,
        amount: Option<Cents>,
    ) -> Result<ReconcileOutcome, MarketError> {
        let mut order = self
            .db
            .fetch_order_by_intent(intent_ref)
            .await?
            .ok_or_else(|| MarketError::PaymentIntentNotFound(intent_ref.to_string()))?;
        let status = GatewayStatus::parse(gateway_status);
        trace!("💳️ Gateway reports {status} for intent {intent_ref} (order {})", order.order_id);
        if let Some(actual) = amount {
            if actual != order.total_amount {
                warn!(
                    "💳️ Intent {intent_ref} reports {actual}, but order {} totals {}. Notification rejected.",
                    order.order_id, order.total_amount
                );
                self.db.record_payment_event(intent_ref, gateway_status, amount, PaymentEventOutcome::Ignored).await?;
                return Err(MarketError::AmountMismatch { expected: order.total_amount, actual });
            }
        }
        let Some(target) = status.target() else {
            debug!("💳️ Gateway status {status} for intent {intent_ref} has no effect on orders");
            self.db.record_payment_event(intent_ref, gateway_status, amount, PaymentEventOutcome::Ignored).await?;
            return Ok(ReconcileOutcome::NoOp { order, reason: NoOpReason::Ignored });
        };
        let mut attempts = 0;
        let outcome = loop {
            let current = (order.status, order.payment_status);
            if current == target {
                break ReconcileOutcome::NoOp { order, reason: NoOpReason::Duplicate };
            }
            if !is_reachable(current, target) {
                break ReconcileOutcome::NoOp { order, reason: NoOpReason::Stale };
            }
            attempts += 1;
            if attempts > MAX_CAS_ATTEMPTS {
                warn!("💳️ Order {} kept changing while applying {status}. Giving up.", order.order_id);
                return Err(MarketError::ContentionLimitReached(order.order_id));
            }
            let change = StatusChange::to(target.0)
                .from_status(order.status)
                .with_expected_payment_status(order.payment_status)
                .with_payment_status(target.1);
            match self.db.compare_and_set_status(&order.order_id, change).await? {
                Some(updated) => {
                    info!(
                        "💳️ Order {} moved from ({}, {}) to ({}, {}) by gateway status {status}",
                        updated.order_id,
                        order.status,
                        order.payment_status,
                        updated.status,
                        updated.payment_status
                    );
                    self.notify_payment_change(&order, &updated);
                    break ReconcileOutcome::Applied(updated);
                },
                None => {
                    debug!("💳️ Order {} changed concurrently. Re-reading.", order.order_id);
                    order = self
                        .db
                        .fetch_order_by_intent(intent_ref)
                        .await?
                        .ok_or_else(|| MarketError::PaymentIntentNotFound(intent_ref.to_string()))?;
                },
            }
        };
        let logged = match &outcome {
            ReconcileOutcome::Applied(_) => PaymentEventOutcome::Applied,
            ReconcileOutcome::NoOp { reason: NoOpReason::Duplicate, .. } => PaymentEventOutcome::Duplicate,
            ReconcileOutcome::NoOp { reason: NoOpReason::Stale, .. } => PaymentEventOutcome::Stale,
            ReconcileOutcome::NoOp { reason: NoOpReason::Ignored, .. } => PaymentEventOutcome::Ignored,
        };
        if !outcome.is_applied() {
            debug!("💳️ Gateway status {status} for intent {intent_ref} not applied ({logged})");
        }
        self.db.record_payment_event(intent_ref, gateway_status, amount, logged).await?;
        let order = outcome.order();
        // A stale status never overwrites the mirrored one
        if logged == PaymentEventOutcome::Stale && self.db.fetch_payment_intent(intent_ref).await?.is_some() {
            return Ok(outcome);
        }
        let mirror = GatewayIntent {
            intent_ref: intent_ref.to_string(),
            status: status.to_string(),
            amount: amount.unwrap_or(order.total_amount),
            currency: order.currency.clone(),
            client_secret: None,
        };
        self.db.upsert_payment_intent(&order.order_id, &mirror).await?;
        Ok(outcome)
    }

    /// Creates (or returns the existing) gateway payment intent for the order, so that the buyer can pay for it.
    ///
    /// The intent amount is always the order total.
    pub async fn create_payment_intent(
        &self,
        actor: &Actor,
        order_id: &OrderId,
    ) -> Result<PaymentIntentResponse, MarketError> {
        let order = self.fetch_order(order_id).await?;
        let allowed = match actor.role {
            Role::Customer => order.buyer_id == actor.subject_id,
            Role::Admin | Role::System => true,
            Role::Farmer => false,
        };
        if !allowed {
            return Err(MarketError::PermissionDenied(format!("{actor} may not pay for order {order_id}")));
        }
        if !matches!(order.status, OrderStatusType::Pending | OrderStatusType::PaymentFailed) {
            return Err(MarketError::ValidationError(format!(
                "Order {order_id} is {} and does not accept payment",
                order.status
            )));
        }
        if let Some(existing) = &order.payment_intent_ref {
            debug!("💳️ Order {order_id} already has intent {existing}. Returning it.");
            let intent = self.gateway.get_intent(existing).await?;
            return Ok(intent_response(intent));
        }
        let metadata = vec![
            ("order_id".to_string(), order_id.as_str().to_string()),
            ("buyer_id".to_string(), order.buyer_id.clone()),
        ];
        let intent = self.gateway.create_intent(order.total_amount, &order.currency, &metadata).await?;
        info!("💳️ Created payment intent {} for order {order_id} ({})", intent.intent_ref, order.total_amount);
        match self.db.bind_payment_intent(order_id, &intent.intent_ref).await {
            Ok(_) => {},
            Err(MarketError::IntentAlreadyBound { existing, .. }) => {
                // Another request won the race. Its intent is the one the buyer must pay.
                warn!("💳️ Order {order_id} was bound to {existing} concurrently. Discarding {}", intent.intent_ref);
                let intent = self.gateway.get_intent(&existing).await?;
                return Ok(intent_response(intent));
            },
            Err(e) => return Err(e),
        }
        self.db.upsert_payment_intent(order_id, &intent).await?;
        Ok(intent_response(intent))
    }

    /// Fetches the current intent state from the gateway and reconciles the order with it. This is the pull
    /// counterpart of a webhook notification.
    ///
    /// A freshly created intent sits in `requires_payment_method` until the buyer pays. When polling, that state only
    /// counts as a failure once a payment attempt has been seen.
    pub async fn refresh_from_gateway(&self, intent_ref: &str) -> Result<ReconcileOutcome, MarketError> {
        let intent = self.gateway.get_intent(intent_ref).await?;
        if GatewayStatus::parse(&intent.status) == GatewayStatus::RequiresPaymentMethod {
            let order = self
                .db
                .fetch_order_by_intent(intent_ref)
                .await?
                .ok_or_else(|| MarketError::PaymentIntentNotFound(intent_ref.to_string()))?;
            if order.payment_status == PaymentStatusType::Pending {
                trace!("💳️ Intent {intent_ref} is still awaiting payment");
                return Ok(ReconcileOutcome::NoOp { order, reason: NoOpReason::Ignored });
            }
        }
        self.sync_from_gateway_status(intent_ref, &intent.status, Some(intent.amount)).await
    }

    /// Reports the payment state of the order, including the gateway's own view if the order has an intent.
    pub async fn gateway_payment_status(
        &self,
        actor: &Actor,
        order_id: &OrderId,
    ) -> Result<PaymentStatusReport, MarketError> {
        let order = self.fetch_order(order_id).await?;
        let allowed = match actor.role {
            Role::Customer => order.buyer_id == actor.subject_id,
            Role::Farmer => order.involves_farmer(&actor.subject_id),
            Role::Admin | Role::System => true,
        };
        if !allowed {
            return Err(MarketError::PermissionDenied(format!("{actor} may not view payment for {order_id}")));
        }
        let gateway_status = match &order.payment_intent_ref {
            Some(intent_ref) => Some(self.gateway.get_intent(intent_ref).await?.status),
            None => None,
        };
        Ok(PaymentStatusReport { order_status: order.status, payment_status: order.payment_status, gateway_status })
    }

    /// Refreshes every unsettled order that has a payment intent, oldest first. Orders are read `page_size` at a time,
    /// so a long backlog of abandoned payments cannot keep newer orders from being polled. Failures for one order are
    /// logged and do not stop the others.
    ///
    /// Returns the orders that changed.
    pub async fn poll_unsettled_payments(&self, page_size: i64) -> Result<Vec<Order>, MarketError> {
        let page_size = page_size.max(1);
        let mut query = OrderQueryFilter::default()
            .with_payment_intent(true)
            .with_status(OrderStatusType::Pending)
            .with_status(OrderStatusType::PaymentFailed)
            .with_payment_status(PaymentStatusType::Pending)
            .with_payment_status(PaymentStatusType::Processing)
            .with_payment_status(PaymentStatusType::Failed)
            .oldest_first()
            .with_limit(page_size);
        let mut changed = Vec::new();
        let mut polled = 0;
        loop {
            let page = self.db.search_orders(query.clone()).await?;
            let Some(last) = page.last() else { break };
            let next = query.clone().after(last);
            let is_last_page = (page.len() as i64) < page_size;
            polled += page.len();
            for order in page {
                let Some(intent_ref) = order.payment_intent_ref.as_deref() else { continue };
                match self.refresh_from_gateway(intent_ref).await {
                    Ok(ReconcileOutcome::Applied(updated)) => changed.push(updated),
                    Ok(_) => {},
                    Err(e) => warn!("💳️ Could not refresh payment for order {}: {e}", order.order_id),
                }
            }
            if is_last_page {
                break;
            }
            query = next;
        }
        trace!("💳️ Polled the gateway for {polled} unsettled order(s). {} changed", changed.len());
        Ok(changed)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, MarketError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| MarketError::OrderNotFound(order_id.clone()))
    }

    fn notify_payment_change(&self, old: &Order, new: &Order) {
        let event = OrderStatusChangedEvent::new(new.clone(), old.status, old.payment_status, Actor::system());
        self.producers.publish_status_changed(event);
        let kind = match new.status {
            OrderStatusType::Confirmed => Some(NotificationKind::PaymentConfirmed),
            OrderStatusType::PaymentFailed if old.status != OrderStatusType::PaymentFailed => {
                Some(NotificationKind::PaymentFailed)
            },
            _ => None,
        };
        if let Some(kind) = kind {
            self.producers.publish_notification(NotificationEvent::payment_update(new, kind));
        }
    }
}

fn intent_response(intent: GatewayIntent) -> PaymentIntentResponse {
    PaymentIntentResponse {
        intent_ref: intent.intent_ref,
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency,
    }
}
