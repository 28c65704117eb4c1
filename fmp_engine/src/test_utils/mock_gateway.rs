use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use fmp_common::Cents;
use tokio::sync::Mutex;

use crate::traits::{GatewayIntent, MarketError, PaymentGateway};

/// An in-memory payment gateway. Intents start out as `requires_payment_method`, and tests move them along with
/// [`MockGateway::set_status`].
#[derive(Clone, Default)]
pub struct MockGateway {
    intents: Arc<Mutex<HashMap<String, GatewayIntent>>>,
    counter: Arc<AtomicU64>,
    offline: Arc<AtomicBool>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_status(&self, intent_ref: &str, status: &str) {
        if let Some(intent) = self.intents.lock().await.get_mut(intent_ref) {
            intent.status = status.to_string();
        }
    }

    /// Simulates a gateway outage. Every call fails with an upstream error while offline.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn intent_count(&self) -> usize {
        self.intents.lock().await.len()
    }

    fn check_online(&self) -> Result<(), MarketError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(MarketError::UpstreamError("Mock gateway is offline".into()))
        } else {
            Ok(())
        }
    }
}

impl PaymentGateway for MockGateway {
    async fn create_intent(
        &self,
        amount: Cents,
        currency: &str,
        _metadata: &[(String, String)],
    ) -> Result<GatewayIntent, MarketError> {
        self.check_online()?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let intent = GatewayIntent {
            intent_ref: format!("pi_mock_{n}"),
            status: "requires_payment_method".to_string(),
            amount,
            currency: currency.to_string(),
            client_secret: Some(format!("pi_mock_{n}_secret")),
        };
        self.intents.lock().await.insert(intent.intent_ref.clone(), intent.clone());
        Ok(intent)
    }

    async fn get_intent(&self, intent_ref: &str) -> Result<GatewayIntent, MarketError> {
        self.check_online()?;
        self.intents
            .lock()
            .await
            .get(intent_ref)
            .cloned()
            .ok_or_else(|| MarketError::PaymentIntentNotFound(intent_ref.to_string()))
    }
}
