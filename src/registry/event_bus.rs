use tokio::sync::broadcast;
use tracing::trace;

use crate::ConnectionEvent;
use crate::ServiceChangeEvent;

/// A typed, in-process publish/subscribe topic.
///
/// Delivery is at-most-once and fire-and-forget: publishing with no subscriber
/// drops the event, and a subscriber that lags behind `capacity` loses the
/// oldest events.
#[derive(Debug)]
pub struct EventTopic<E> {
    name: &'static str,
    sender: broadcast::Sender<E>,
}

impl<E> Clone for EventTopic<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            sender: self.sender.clone(),
        }
    }
}

impl<E: Clone + Send + 'static> EventTopic<E> {
    pub fn new(
        name: &'static str,
        capacity: usize,
    ) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { name, sender }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of subscribers the event reached
    pub fn publish(
        &self,
        event: E,
    ) -> usize {
        match self.sender.send(event) {
            Ok(n) => n,
            Err(_) => {
                trace!(topic = self.name, "no subscriber, event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// The topics the core publishes on
#[derive(Debug, Clone)]
pub struct EventBus {
    pub service_changes: EventTopic<ServiceChangeEvent>,
    pub connections: EventTopic<ConnectionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            service_changes: EventTopic::new("service_changes", capacity),
            connections: EventTopic::new("connections", capacity),
        }
    }
}
