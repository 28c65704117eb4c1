use chrono::Utc;
use fmp_common::Cents;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{OrderId, PaymentEvent, PaymentEventOutcome, PaymentIntentRecord},
    traits::GatewayIntent,
};

/// Inserts the intent into the local mirror, or refreshes its status and amount if it is already known.
pub async fn upsert_intent(
    order_id: &OrderId,
    intent: &GatewayIntent,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntentRecord, sqlx::Error> {
    let record = sqlx::query_as(
        r#"
            INSERT INTO payment_intents (intent_ref, order_id, status, amount, currency, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            ON CONFLICT (intent_ref) DO UPDATE
                SET status = excluded.status, amount = excluded.amount, updated_at = excluded.updated_at
            RETURNING *;
        "#,
    )
    .bind(&intent.intent_ref)
    .bind(order_id.as_str())
    .bind(&intent.status)
    .bind(intent.amount)
    .bind(&intent.currency)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    trace!("💳️ Payment intent {} mirrored with status {}", intent.intent_ref, intent.status);
    Ok(record)
}

pub async fn fetch_intent(
    intent_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentIntentRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_intents WHERE intent_ref = $1").bind(intent_ref).fetch_optional(conn).await
}

pub async fn insert_event(
    intent_ref: &str,
    gateway_status: &str,
    amount: Option<Cents>,
    outcome: PaymentEventOutcome,
    conn: &mut SqliteConnection,
) -> Result<PaymentEvent, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO payment_events (intent_ref, gateway_status, amount, outcome, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(intent_ref)
    .bind(gateway_status)
    .bind(amount)
    .bind(outcome)
    .bind(Utc::now())
    .fetch_one(conn)
    .await
}

pub async fn events_for_intent(intent_ref: &str, conn: &mut SqliteConnection) -> Result<Vec<PaymentEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_events WHERE intent_ref = $1 ORDER BY id ASC")
        .bind(intent_ref)
        .fetch_all(conn)
        .await
}
