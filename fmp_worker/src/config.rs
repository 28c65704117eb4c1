use std::{env, time::Duration};

use fmp_common::{parse_boolean_flag, parse_env_or_default};
use fmp_engine::EngineConfig;
use log::*;
use stripe_tools::StripeConfig;

const DEFAULT_REPAIR_INTERVAL_SECS: u64 = 60;
const DEFAULT_PAYMENT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_PAYMENT_POLL_BATCH: i64 = 100;

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub engine: EngineConfig,
    /// Time between runs of the reservation repair job.
    pub repair_interval: Duration,
    /// If false, the payment poller is not started and orders only move on webhook notifications.
    pub payment_polling: bool,
    pub payment_poll_interval: Duration,
    /// The most unsettled orders checked against the gateway in a single poll.
    pub payment_poll_batch: i64,
    pub stripe: StripeConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            repair_interval: Duration::from_secs(DEFAULT_REPAIR_INTERVAL_SECS),
            payment_polling: true,
            payment_poll_interval: Duration::from_secs(DEFAULT_PAYMENT_POLL_INTERVAL_SECS),
            payment_poll_batch: DEFAULT_PAYMENT_POLL_BATCH,
            stripe: StripeConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let engine = EngineConfig::from_env_or_defaults();
        let repair_interval = interval_from_env("FMP_REPAIR_INTERVAL", DEFAULT_REPAIR_INTERVAL_SECS);
        let payment_polling = parse_boolean_flag(env::var("FMP_PAYMENT_POLLING").ok(), true);
        let payment_poll_interval = interval_from_env("FMP_PAYMENT_POLL_INTERVAL", DEFAULT_PAYMENT_POLL_INTERVAL_SECS);
        let payment_poll_batch = match parse_env_or_default("FMP_PAYMENT_POLL_BATCH", DEFAULT_PAYMENT_POLL_BATCH) {
            n if n > 0 => n,
            n => {
                warn!("🪛️ FMP_PAYMENT_POLL_BATCH must be positive, but was {n}. Using {DEFAULT_PAYMENT_POLL_BATCH}.");
                DEFAULT_PAYMENT_POLL_BATCH
            },
        };
        let stripe = if payment_polling {
            StripeConfig::new_from_env_or_default()
        } else {
            info!("🪛️ Payment polling is disabled. Orders will only be updated by gateway notifications.");
            StripeConfig::default()
        };
        Self { engine, repair_interval, payment_polling, payment_poll_interval, payment_poll_batch, stripe }
    }
}

fn interval_from_env(name: &str, default_secs: u64) -> Duration {
    match parse_env_or_default(name, default_secs) {
        0 => {
            warn!("🪛️ {name} cannot be zero. Using the default value of {default_secs}s.");
            Duration::from_secs(default_secs)
        },
        secs => Duration::from_secs(secs),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn config_from_env() {
        env::set_var("FMP_REPAIR_INTERVAL", "5");
        env::set_var("FMP_PAYMENT_POLL_INTERVAL", "0");
        env::set_var("FMP_PAYMENT_POLL_BATCH", "-3");
        env::set_var("FMP_PAYMENT_POLLING", "off");
        let config = WorkerConfig::from_env_or_default();
        assert_eq!(config.repair_interval, Duration::from_secs(5));
        assert_eq!(config.payment_poll_interval, Duration::from_secs(DEFAULT_PAYMENT_POLL_INTERVAL_SECS));
        assert_eq!(config.payment_poll_batch, DEFAULT_PAYMENT_POLL_BATCH);
        assert!(!config.payment_polling);
        assert!(config.stripe.secret_key.is_unset());
    }
}
