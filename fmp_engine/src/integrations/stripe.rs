//! Stripe as the engine's [`PaymentGateway`].
use fmp_common::Cents;
use log::*;
use stripe_tools::{NewPaymentIntent, PaymentIntent, StripeApi, StripeApiError};

use crate::traits::{GatewayIntent, MarketError, PaymentGateway};

impl PaymentGateway for StripeApi {
    async fn create_intent(
        &self,
        amount: Cents,
        currency: &str,
        metadata: &[(String, String)],
    ) -> Result<GatewayIntent, MarketError> {
        let request = metadata
            .iter()
            .fold(NewPaymentIntent::new(amount.value(), currency), |req, (k, v)| req.with_metadata(k, v));
        let intent = self.create_payment_intent(request).await.map_err(to_market_error)?;
        Ok(to_gateway_intent(intent))
    }

    async fn get_intent(&self, intent_ref: &str) -> Result<GatewayIntent, MarketError> {
        let intent = self.get_payment_intent(intent_ref).await.map_err(to_market_error)?;
        Ok(to_gateway_intent(intent))
    }
}

fn to_gateway_intent(intent: PaymentIntent) -> GatewayIntent {
    GatewayIntent {
        intent_ref: intent.id,
        status: intent.status,
        amount: Cents::from(intent.amount),
        currency: intent.currency,
        client_secret: intent.client_secret,
    }
}

fn to_market_error(e: StripeApiError) -> MarketError {
    match e {
        StripeApiError::IntentNotFound(id) => MarketError::PaymentIntentNotFound(id),
        StripeApiError::InvalidRequest(msg) => MarketError::ValidationError(msg),
        e => {
            warn!("💳️ Stripe request failed: {e}");
            MarketError::UpstreamError(e.to_string())
        },
    }
}
