//! Request/acknowledgement correlation for one-way streamed pushes.
//!
//! A sender registers an [`InFlightEntry`] keyed by `(connection_id,
//! request_id)` before writing a request to the client stream. When the
//! client's acknowledgement comes back through the connection manager, the
//! entry's callback fires exactly once and the entry is discarded.
//!
//! Entries leave the table in one of four ways:
//! - matching acknowledgement ([`InFlightTable::notify_in_flight`])
//! - synthesized failure when the stream send fails
//! - expiry ([`InFlightTable::sweep_expired`], run periodically)
//! - ejection of the owning connection ([`InFlightTable::remove_connection`])
mod table;


pub use table::*;
