//! Materialized, protocol-specific view of the authoritative registry.
//!
//! A periodic task (and the first reader) refreshes the view. Refreshes are
//! coalesced so only one pass runs at a time; each pass diffs every service's
//! revision against the last one seen, rebuilds the views that changed and
//! publishes them as one [`ServiceChangeEvent`](crate::ServiceChangeEvent).
mod engine;
mod filter;
mod single_flight;

#[cfg(test)]
mod filter_test;
#[cfg(test)]
mod single_flight_test;

pub use engine::*;
pub use filter::*;
pub use single_flight::*;
