//! Subscriber registry and change fan-out.
//!
//! A [`PushCenter`] serves one transport. Each remote client interested in at
//! least one resource is a [`WatchClient`] owning exactly one [`Notifier`];
//! when the sync engine publishes a change, every watch client subscribed to
//! the changed resource is notified concurrently.
mod center;
mod datagram;
mod notifier;
mod payload;
mod stream;
mod subscriber;

#[cfg(test)]
mod datagram_test;
#[cfg(test)]
mod stream_test;

pub use center::*;
pub use datagram::*;
pub use notifier::*;
pub use payload::*;
pub use stream::*;
pub use subscriber::*;
