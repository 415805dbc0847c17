//! Publish/subscribe mechanics shared by the stateful access services.
//!
//! Services expose `subscribe(listener) -> Subscription`; dropping or
//! explicitly unsubscribing the handle detaches the listener exactly once.

pub mod bus;
pub mod in_memory_bus;

pub use bus::{Listener, Publisher, Subscription};
pub use in_memory_bus::Listeners;
