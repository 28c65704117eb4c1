//! # Marketplace engine public API
//!
//! The `fmp_api` module exposes the programmatic API of the engine. The API is modular, so that callers can pick the
//! pieces they need.
//!
//! * [`inventory_api`] owns product stock levels and repairs abandoned reservations.
//! * [`cart_api`] maintains each buyer's cart.
//! * [`order_api`] enforces the order lifecycle and who may move an order along it.
//! * [`payment_api`] reconciles orders with the card payment gateway.
//! * [`checkout_api`] turns a cart into an order without ever losing or double-selling stock.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the traits the API needs. APIs that publish events
//! also take an [`crate::events::EventProducers`].
//!
//! ```rust,ignore
//! use fmp_engine::{CheckoutApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = CheckoutApi::new(db, producers);
//! let order = api.checkout(&Actor::customer("alice"), request).await?;
//! ```
pub mod cart_api;
pub mod checkout_api;
pub mod inventory_api;
pub mod order_api;
pub mod order_objects;
pub mod payment_api;
pub mod payment_objects;
