//! Duplicate-checked subscription registry over the bus.

mod registry;

pub use registry::SubscriptionRegistry;
