//! Change-propagation and connection-liveness core of a Nacos-compatible
//! service discovery control plane.
//!
//! - [`SyncEngine`] materializes the authoritative registry into per-service
//!   views and publishes what changed.
//! - [`PushCenter`] maps client interest to a [`Notifier`] and fans changes out.
//! - [`ConnectionManager`] tracks streaming connections and evicts dead ones.
//! - [`InFlightTable`] correlates streamed pushes with their acknowledgements.
//!
//! [`NodeBuilder`] wires them together and owns their background tasks.

mod config;
mod connection;
mod constants;
mod errors;
mod inflight;
mod metrics;
mod model;
mod node;
mod push;
mod registry;
mod sync;
pub mod utils;

pub use config::*;
pub use connection::*;
pub use errors::*;
pub use inflight::*;
pub use metrics::*;
pub use model::*;
pub use node::*;
pub use push::*;
pub use registry::*;
pub use sync::*;

#[cfg(test)]
pub(crate) mod test_utils;
