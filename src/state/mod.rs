//! Observable state with one-deep history.
//!
//! Each key holds its current value and the value it replaced; every
//! accepted change is broadcast on the bus before the call returns.

mod store;

pub use store::{StateEntry, StateStore};
