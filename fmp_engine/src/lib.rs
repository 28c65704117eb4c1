//! Farmer Marketplace Engine
//!
//! The engine keeps orders, stock and payments consistent for a marketplace where buyers order produce from many
//! farmers at once. It is storage-agnostic: backends implement the traits in [`traits`], and [`SqliteDatabase`] is
//! the backend that ships with the crate.
//!
//! The library is divided into three main sections:
//! 1. The backend contracts ([`mod@traits`]) and the SQLite implementation of them. You should never need to touch
//!    the database directly. The exception is the data types stored in it, which live in [`db_types`] and are public.
//! 2. The public API ([`mod@fmp_api`]). [`CheckoutApi`], [`OrderApi`], [`PaymentApi`], [`CartApi`] and
//!    [`InventoryApi`] each wrap a backend and expose one part of the engine.
//! 3. Events ([`mod@events`]). Order creation, status changes and buyer/farmer notifications are published to hooks
//!    that callers register at start-up.
mod fmp_api;
mod integrations;

pub mod config;
pub mod db_types;
pub mod events;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use config::EngineConfig;
pub use fmp_api::{
    cart_api::{CartApi, CartSnapshot},
    checkout_api::CheckoutApi,
    inventory_api::InventoryApi,
    order_api::OrderApi,
    order_objects,
    payment_api::PaymentApi,
    payment_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
