use fmp_common::Cents;

use crate::{
    db_types::{OrderId, PaymentEvent, PaymentEventOutcome, PaymentIntentRecord},
    traits::{GatewayIntent, MarketError},
};

/// Local bookkeeping for payment intents and the gateway notifications that refer to them.
#[allow(async_fn_in_trait)]
pub trait PaymentRecords {
    /// Inserts or refreshes the local mirror of a gateway intent.
    async fn upsert_payment_intent(
        &self,
        order_id: &OrderId,
        intent: &GatewayIntent,
    ) -> Result<PaymentIntentRecord, MarketError>;

    async fn fetch_payment_intent(&self, intent_ref: &str) -> Result<Option<PaymentIntentRecord>, MarketError>;

    /// Appends an entry to the payment event log.
    async fn record_payment_event(
        &self,
        intent_ref: &str,
        gateway_status: &str,
        amount: Option<Cents>,
        outcome: PaymentEventOutcome,
    ) -> Result<PaymentEvent, MarketError>;

    /// All notifications seen for the intent, oldest first.
    async fn payment_events_for_intent(&self, intent_ref: &str) -> Result<Vec<PaymentEvent>, MarketError>;
}
