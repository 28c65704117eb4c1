use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
    StatusCode,
};
use serde::de::DeserializeOwned;

use crate::{
    config::StripeConfig,
    data_objects::{NewPaymentIntent, PaymentIntent},
    StripeApiError,
};

#[derive(Clone)]
pub struct StripeApi {
    config: StripeConfig,
    client: Arc<Client>,
}

impl StripeApi {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        if config.secret_key.is_unset() {
            return Err(StripeApiError::Initialization("The Stripe secret key has not been configured".into()));
        }
        let mut headers = HeaderMap::with_capacity(1);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let mut val = HeaderValue::from_str(&bearer).map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StripeApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    async fn rest_query<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Option<&[(String, String)]>,
    ) -> Result<T, StripeApiError> {
        let url = self.url(path);
        trace!("💳️ Sending Stripe request: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(form) = form {
            req = req.form(form);
        }
        let response = req.send().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("💳️ Stripe request successful. {status}");
            response.json::<T>().await.map_err(|e| StripeApiError::JsonError(e.to_string()))
        } else {
            let message = response.text().await.map_err(|e| StripeApiError::RestResponseError(e.to_string()))?;
            Err(StripeApiError::QueryError { status: status.as_u16(), message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.api_url)
    }

    pub async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, StripeApiError> {
        if intent.amount <= 0 {
            return Err(StripeApiError::InvalidRequest(format!("Amount must be positive, got {}", intent.amount)));
        }
        debug!("💳️ Creating payment intent for {} {}", intent.amount, intent.currency);
        let params = intent.form_params();
        let result =
            self.rest_query::<PaymentIntent>(Method::POST, "/payment_intents", Some(params.as_slice())).await?;
        info!("💳️ Created payment intent {}", result.id);
        Ok(result)
    }

    pub async fn get_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, StripeApiError> {
        validate_intent_id(intent_id)?;
        let path = format!("/payment_intents/{intent_id}");
        debug!("💳️ Fetching payment intent {intent_id}");
        match self.rest_query::<PaymentIntent>(Method::GET, &path, None).await {
            Err(StripeApiError::QueryError { status, .. }) if status == StatusCode::NOT_FOUND.as_u16() => {
                Err(StripeApiError::IntentNotFound(intent_id.to_string()))
            },
            other => other,
        }
    }
}

/// Intent ids go into the request path, so only the characters Stripe uses for ids are accepted.
fn validate_intent_id(intent_id: &str) -> Result<(), StripeApiError> {
    let valid = !intent_id.is_empty() && intent_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StripeApiError::InvalidRequest(format!("'{intent_id}' is not a valid payment intent id")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn refuses_to_start_without_a_key() {
        let config = StripeConfig::new("https://api.stripe.com", "");
        assert!(matches!(StripeApi::new(config), Err(StripeApiError::Initialization(_))));
    }

    #[test]
    fn builds_versioned_urls() {
        let config = StripeConfig::new("http://localhost:12111/", "sk_test_xyz");
        let api = StripeApi::new(config).unwrap();
        assert_eq!(api.url("/payment_intents/pi_1"), "http://localhost:12111/v1/payment_intents/pi_1");
    }

    #[test]
    fn intent_ids_are_checked_before_use() {
        assert!(validate_intent_id("pi_3MtwBwLkdIwHu7ix28a3tqPa").is_ok());
        for bad in ["", "pi_1/../../customers", "pi_1?expand=x", "pi 1", "pi_1#"] {
            assert!(matches!(validate_intent_id(bad), Err(StripeApiError::InvalidRequest(_))), "{bad} was accepted");
        }
    }

    #[tokio::test]
    async fn get_payment_intent_rejects_path_characters() {
        let api = StripeApi::new(StripeConfig::new("http://127.0.0.1:9", "sk_test_xyz")).unwrap();
        let err = api.get_payment_intent("pi_1/refunds").await.unwrap_err();
        assert!(matches!(err, StripeApiError::InvalidRequest(_)));
    }
}
