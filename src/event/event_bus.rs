// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast channel for optimizer events.

use tokio::sync::broadcast;

use super::OptimizerEvent;

/// Buffered events per subscriber.
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Fan-out of [`OptimizerEvent`]s to any number of subscribers.
///
/// Clones share one tokio broadcast channel, so the manager and every
/// optimizer publish into the same stream.
///
/// Publishing never blocks the dispatch loop. A subscriber that falls more
/// than the capacity behind loses the oldest events and sees
/// `RecvError::Lagged` on its next receive.
///
/// # Examples
///
/// ```
/// use demand_optimizer::event::{EventBus, OptimizerEvent};
/// use demand_optimizer::types::DeviceAddress;
///
/// let bus = EventBus::new();
/// let mut rx = bus.subscribe();
///
/// bus.publish(OptimizerEvent::OptOutExpired {
///     address: DeviceAddress::from("n1"),
/// });
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.address().unwrap().as_str(), "n1");
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OptimizerEvent>,
}

impl EventBus {
    /// Creates a bus buffering 256 events.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates a bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OptimizerEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publishes an event. Without subscribers the event is dropped.
    pub fn publish(&self, event: OptimizerEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            tracing::trace!(?event, "No event subscribers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DeviceAddress;

    fn expired(address: &str) -> OptimizerEvent {
        OptimizerEvent::OptOutExpired {
            address: DeviceAddress::from(address),
        }
    }

    #[test]
    fn new_bus_has_no_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribe_and_drop_track_count() {
        let bus = EventBus::new();

        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn publish_delivers_to_every_subscriber() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(expired("n7"));

        assert_eq!(rx1.recv().await.unwrap(), expired("n7"));
        assert_eq!(rx2.recv().await.unwrap(), expired("n7"));
    }

    #[test]
    fn clone_shares_same_channel() {
        let bus1 = EventBus::with_capacity(8);
        let bus2 = bus1.clone();

        let mut rx = bus1.subscribe();
        assert_eq!(bus2.subscriber_count(), 1);

        bus2.publish(expired("n2"));
        assert_eq!(rx.try_recv().unwrap(), expired("n2"));
    }
}
