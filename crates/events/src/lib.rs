//! `payforge-events` — document event mechanics (no business rules).
//!
//! Domain crates emit events from aggregate commands; infrastructure wraps
//! them in envelopes, distributes them on a bus, and feeds read models.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::InMemoryEventBus;
