//! Order lifecycle events and buyer/farmer notifications.
//!
//! API objects publish events through [`EventProducers`]. Subscribers register async closures on [`EventHooks`], which
//! are turned into running [`EventHandler`]s by [`EventHandlers`]. Delivery is best effort: a full or closed channel
//! is logged and the event dropped, and never fails the operation that produced it.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
