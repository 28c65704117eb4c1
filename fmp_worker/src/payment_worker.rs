use fmp_engine::{db_types::Order, events::EventProducers, PaymentApi, SqliteDatabase};
use log::*;
use stripe_tools::StripeApi;
use tokio::task::JoinHandle;

/// Starts the payment poller. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, the orders that are still waiting on their payment are refreshed from the gateway, `batch_size`
/// orders per database read. This catches up on gateway notifications that never arrived.
pub fn start_payment_poller(
    db: SqliteDatabase,
    gateway: StripeApi,
    producers: EventProducers,
    interval: std::time::Duration,
    batch_size: i64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = PaymentApi::new(db, gateway, producers);
        info!("🕰️ Payment poller started");
        loop {
            timer.tick().await;
            debug!("🕰️ Polling the payment gateway");
            match api.poll_unsettled_payments(batch_size).await {
                Ok(changed) if changed.is_empty() => {
                    trace!("🕰️ No payment updates");
                },
                Ok(changed) => {
                    info!("🕰️ {} order(s) updated from the payment gateway", changed.len());
                    debug!("🕰️ Updated orders: {}", order_list(&changed));
                },
                Err(e) => {
                    error!("🕰️ Error polling the payment gateway: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("{} ({}, {})", o.order_id, o.status, o.payment_status))
        .collect::<Vec<String>>()
        .join(", ")
}
