use fmp_common::Cents;

use crate::traits::{GatewayIntent, MarketError};

/// The external card payment provider. Implementations map transport failures onto `MarketError::UpstreamError`.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    /// Creates a payment intent for `amount` in `currency`. The metadata is attached to the intent so that it can be
    /// traced back to the order from the gateway dashboard.
    async fn create_intent(
        &self,
        amount: Cents,
        currency: &str,
        metadata: &[(String, String)],
    ) -> Result<GatewayIntent, MarketError>;

    /// Fetches the current state of the intent from the gateway.
    ///
    /// Returns `PaymentIntentNotFound` if the gateway does not know the reference.
    async fn get_intent(&self, intent_ref: &str) -> Result<GatewayIntent, MarketError>;
}
