//! Adapters that connect the engine's traits to concrete external services.
#[cfg(feature = "stripe")]
mod stripe;
