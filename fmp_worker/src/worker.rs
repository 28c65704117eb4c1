use fmp_engine::{events::EventHandlers, traits::MarketplaceDatabase, SqliteDatabase};
use log::*;
use stripe_tools::StripeApi;
use tokio::task::JoinHandle;

use crate::{
    config::WorkerConfig,
    errors::WorkerError,
    notifications::worker_hooks,
    payment_worker::start_payment_poller,
    repair_worker::start_repair_worker,
};

/// Runs the worker until Ctrl-C is received.
pub async fn run_worker(config: WorkerConfig) -> Result<(), WorkerError> {
    let db = SqliteDatabase::from_config(&config.engine)
        .await
        .map_err(|e| WorkerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| WorkerError::MigrationError(e.to_string()))?;
    info!("🗃️ Connected to {}", db.url());

    let handlers = EventHandlers::new(config.engine.event_buffer_size, worker_hooks());
    let producers = handlers.producers();
    let hook_tasks = handlers.start_handlers();

    let mut jobs = vec![start_repair_worker(db.clone(), config.repair_interval, config.engine.reservation_timeout)];
    if config.payment_polling && config.stripe.secret_key.is_unset() {
        warn!("🕰️ Payment polling is enabled, but FMP_STRIPE_SECRET_KEY is not set. The payment poller will not run.");
    } else if config.payment_polling {
        let gateway = StripeApi::new(config.stripe.clone())?;
        let poller = start_payment_poller(
            db.clone(),
            gateway,
            producers.clone(),
            config.payment_poll_interval,
            config.payment_poll_batch,
        );
        jobs.push(poller);
    }
    // The jobs hold their own producers. Once they stop, the hook tasks drain and exit.
    drop(producers);

    tokio::signal::ctrl_c().await?;
    info!("🕰️ Shutdown requested. Stopping background jobs.");
    stop_jobs(jobs).await;
    for task in hook_tasks {
        match task.await {
            Ok(handled) => debug!("🕰️ Event hook finished after {handled} event(s)"),
            Err(e) => warn!("🕰️ Event hook did not shut down cleanly. {e}"),
        }
    }
    db.close().await;
    Ok(())
}

async fn stop_jobs(jobs: Vec<JoinHandle<()>>) {
    for job in jobs {
        job.abort();
        match job.await {
            Err(e) if e.is_cancelled() => {},
            Err(e) => warn!("🕰️ A background job failed. {e}"),
            Ok(()) => {},
        }
    }
}
