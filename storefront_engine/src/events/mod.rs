//! Fire-and-forget notifications.
//!
//! The ledger APIs publish events after a transaction commits. Subscribers (e-mail, Discord, audit logs) hook into
//! them via [`EventHooks`]. A slow or failing subscriber never affects the operation that produced the event.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
