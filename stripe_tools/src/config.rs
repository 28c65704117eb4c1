use fmp_common::Secret;
use log::*;

const DEFAULT_STRIPE_API_URL: &str = "https://api.stripe.com";

#[derive(Debug, Clone, Default)]
pub struct StripeConfig {
    /// Base URL of the API, without a trailing slash. Overridable so that tests can point at a local stub.
    pub api_url: String,
    pub secret_key: Secret<String>,
}

impl StripeConfig {
    pub fn new(api_url: &str, secret_key: &str) -> Self {
        Self { api_url: api_url.trim_end_matches('/').to_string(), secret_key: Secret::new(secret_key.to_string()) }
    }

    pub fn new_from_env_or_default() -> Self {
        let api_url = std::env::var("FMP_STRIPE_API_URL").unwrap_or_else(|_| {
            info!("🪛️ FMP_STRIPE_API_URL not set, using {DEFAULT_STRIPE_API_URL}");
            DEFAULT_STRIPE_API_URL.to_string()
        });
        let secret_key = std::env::var("FMP_STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ FMP_STRIPE_SECRET_KEY not set. Payment intents cannot be created until it is configured.");
            String::default()
        });
        Self::new(&api_url, &secret_key)
    }
}
