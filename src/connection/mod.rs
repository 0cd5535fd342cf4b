//! Lifecycle and liveness of streaming client connections.
//!
//! The transport layer reports accepted and closed physical connections; the
//! protocol layer binds client metadata once the setup handshake is seen and
//! attaches the outbound stream. Every inbound frame refreshes the connection.
//! A periodic sweep probes connections that have been silent for longer than
//! the keep-alive window and unregisters those that do not answer in time.
mod frame;
mod manager;
mod record;


pub use frame::*;
pub use manager::*;
pub use record::*;
