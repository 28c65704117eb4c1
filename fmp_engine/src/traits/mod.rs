//! # Backend contracts
//!
//! This module defines the behaviour a storage backend must expose in order to act as the persistence layer of the
//! marketplace engine, as well as the contract for the external payment gateway.
//!
//! * [`CatalogManagement`] read access to products, plus the writes needed to seed and maintain the catalog.
//! * [`InventoryManagement`] the stock ledger and the reservation journal.
//! * [`CartManagement`] per-buyer cart lines.
//! * [`OrderManagement`] the order store, including the atomic checkout commit and guarded status changes.
//! * [`PaymentRecords`] the payment intent mirror and the notification log.
//! * [`PaymentGateway`] the card payment provider.
//!
//! All backend methods report failures with [`MarketError`].
mod cart_management;
mod catalog_management;
mod data_objects;
mod errors;
mod inventory_management;
mod order_management;
mod payment_gateway;
mod payment_records;

pub use cart_management::CartManagement;
pub use catalog_management::CatalogManagement;
pub use data_objects::{GatewayIntent, StatusChange};
pub use errors::{ErrorKind, MarketError};
pub use inventory_management::InventoryManagement;
pub use order_management::OrderManagement;
pub use payment_gateway::PaymentGateway;
pub use payment_records::PaymentRecords;

/// The full set of behaviour required of a marketplace storage backend.
pub trait MarketplaceDatabase:
    Clone + CatalogManagement + InventoryManagement + CartManagement + OrderManagement + PaymentRecords
{
    /// The URL of the database
    fn url(&self) -> &str;
}
