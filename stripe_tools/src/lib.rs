//! A thin client for the parts of the Stripe REST API that the marketplace needs: creating payment intents and reading
//! their status back.
mod api;
mod config;
mod data_objects;
mod error;

pub use api::StripeApi;
pub use config::StripeConfig;
pub use data_objects::{NewPaymentIntent, PaymentIntent};
pub use error::StripeApiError;
