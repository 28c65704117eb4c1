use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The subset of the Stripe `PaymentIntent` object the marketplace reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// One of `requires_payment_method`, `requires_confirmation`, `requires_action`, `processing`,
    /// `requires_capture`, `canceled` or `succeeded`.
    pub status: String,
    /// Amount in the currency's minor unit.
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    pub amount: i64,
    pub currency: String,
    pub metadata: Vec<(String, String)>,
}

impl NewPaymentIntent {
    pub fn new(amount: i64, currency: &str) -> Self {
        Self { amount, currency: currency.to_ascii_lowercase(), metadata: Vec::new() }
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.push((key.to_string(), value.to_string()));
        self
    }

    /// Stripe takes form-encoded bodies, with nested metadata flattened as `metadata[key]=value`.
    pub fn form_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("amount".to_string(), self.amount.to_string()), ("currency".to_string(), self.currency.clone())];
        params.extend(self.metadata.iter().map(|(k, v)| (format!("metadata[{k}]"), v.clone())));
        params
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn deserialize_intent() {
        let json = r#"{
            "id": "pi_3MtwBwLkdIwHu7ix28a3tqPa",
            "object": "payment_intent",
            "amount": 1100,
            "currency": "usd",
            "status": "requires_payment_method",
            "client_secret": "pi_3MtwBwLkdIwHu7ix28a3tqPa_secret_YrKJUKribcBjcG8HVhfZluoGH",
            "metadata": { "order_id": "abc" }
        }"#;
        let intent: PaymentIntent = serde_json::from_str(json).unwrap();
        assert_eq!(intent.id, "pi_3MtwBwLkdIwHu7ix28a3tqPa");
        assert_eq!(intent.amount, 1100);
        assert_eq!(intent.status, "requires_payment_method");
        assert_eq!(intent.metadata.get("order_id").map(String::as_str), Some("abc"));
    }

    #[test]
    fn intent_without_secret_or_metadata() {
        let json = r#"{"id": "pi_1", "amount": 5, "currency": "usd", "status": "succeeded"}"#;
        let intent: PaymentIntent = serde_json::from_str(json).unwrap();
        assert!(intent.client_secret.is_none());
        assert!(intent.metadata.is_empty());
    }

    #[test]
    fn form_params_flatten_metadata() {
        let req = NewPaymentIntent::new(1100, "USD").with_metadata("order_id", "o-1");
        let params = req.form_params();
        assert_eq!(params[0], ("amount".to_string(), "1100".to_string()));
        assert_eq!(params[1], ("currency".to_string(), "usd".to_string()));
        assert_eq!(params[2], ("metadata[order_id]".to_string(), "o-1".to_string()));
    }
}
