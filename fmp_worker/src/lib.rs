//! # Marketplace worker
//! The long-running half of the farmer marketplace. It embeds the engine and runs the jobs that keep it consistent
//! when nobody is calling it:
//! * The reservation repair job returns stock held by checkouts that died before finishing.
//! * The payment poller asks the gateway about unsettled orders, in case a webhook notification was lost.
//! * The notification hooks pick up buyer and farmer notifications published by the engine and dispatch them.
//!
//! ## Configuration
//! The worker is configured via environment variables. See [config](config/index.html) for more information.
pub mod cli;
pub mod config;
pub mod errors;
pub mod notifications;
pub mod payment_worker;
pub mod repair_worker;
pub mod worker;
