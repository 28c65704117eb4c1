//! Notification dispatch.
//!
//! The engine publishes a [`NotificationEvent`] for every message a buyer or farmer should receive. Delivery channels
//! (email, push, in-app) are not part of the marketplace core, so the worker hands each notification to the log under
//! the `fmp::notifications` target, where an external shipper can pick it up.
use fmp_engine::events::{EventHooks, NotificationEvent, OrderCreatedEvent, OrderStatusChangedEvent};
use log::*;
use serde_json::json;

pub const NOTIFICATION_TARGET: &str = "fmp::notifications";

/// The hooks the worker registers with the engine.
pub fn worker_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev| Box::pin(async move { log_order_created(&ev) }))
        .on_status_changed(|ev| Box::pin(async move { log_status_changed(&ev) }))
        .on_notification(|ev| Box::pin(async move { dispatch_notification(&ev) }));
    hooks
}

fn log_order_created(ev: &OrderCreatedEvent) {
    let order = &ev.order;
    info!(
        "📬️ New order {} from {} for {} {} ({} item(s))",
        order.order_id,
        order.buyer_id,
        order.total_amount,
        order.currency,
        order.items.len()
    );
}

fn log_status_changed(ev: &OrderStatusChangedEvent) {
    info!(
        "📬️ Order {} moved from ({}, {}) to ({}, {}) by {}",
        ev.order.order_id,
        ev.old_status,
        ev.old_payment_status,
        ev.order.status,
        ev.order.payment_status,
        ev.changed_by
    );
}

/// Renders the notification as a single JSON line.
pub fn render_notification(ev: &NotificationEvent) -> String {
    json!({
        "recipient": ev.recipient,
        "kind": ev.kind,
        "payload": ev.payload,
    })
    .to_string()
}

fn dispatch_notification(ev: &NotificationEvent) {
    info!(target: NOTIFICATION_TARGET, "{}", render_notification(ev));
}

#[cfg(test)]
mod test {
    use fmp_engine::events::NotificationKind;
    use serde_json::Value;

    use super::*;

    #[test]
    fn notifications_render_as_json() {
        let ev = NotificationEvent::new("fred", NotificationKind::NewOrder, json!({ "order_id": "o1" }));
        let line = render_notification(&ev);
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["recipient"], "fred");
        assert_eq!(value["kind"], "new_order");
        assert_eq!(value["payload"]["order_id"], "o1");
    }

    #[test]
    fn all_hooks_are_registered() {
        let hooks = worker_hooks();
        assert!(hooks.on_order_created.is_some());
        assert!(hooks.on_status_changed.is_some());
        assert!(hooks.on_notification.is_some());
    }
}
