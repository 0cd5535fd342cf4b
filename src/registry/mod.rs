//! Interfaces consumed from the surrounding registry: the read-only cache the
//! sync engine polls, and the in-process event bus components publish to.
mod cache;
mod event_bus;
mod memory;

pub use cache::*;
pub use event_bus::*;
pub use memory::*;

#[cfg(test)]
mod event_bus_test;
