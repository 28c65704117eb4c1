use chrono::Duration;
use fmp_engine::{InventoryApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the reservation repair worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, stock reservations that have been held for longer than `reservation_timeout` are released and
/// their stock returned. These belong to checkouts that crashed or could not compensate.
pub fn start_repair_worker(
    db: SqliteDatabase,
    interval: std::time::Duration,
    reservation_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = InventoryApi::new(db);
        info!("🕰️ Reservation repair worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running reservation repair job");
            match api.release_stale_reservations(reservation_timeout).await {
                Ok(checkouts) if checkouts.is_empty() => {
                    trace!("🕰️ No stale reservations found");
                },
                Ok(checkouts) => {
                    info!("🕰️ Returned stock held by {} abandoned checkout(s)", checkouts.len());
                    debug!("🕰️ Abandoned checkouts: {}", checkouts.join(", "));
                },
                Err(e) => {
                    error!("🕰️ Error running reservation repair job: {e}");
                },
            }
        }
    })
}
