//! Subscription state and the stream that drains it
//!
//! A [`Subscription`] is the sending half shared with the registry; the
//! [`SubscriptionStream`] is the receiving half owned by the streaming
//! connection. Dropping the stream (the client went away) closes the
//! subscription and removes it from its channel.

use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::channel::Channel;
use super::error::DeliveryError;
use super::event::Event;

/// Opaque handle identifying one streaming connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Lifecycle of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SubscriptionState {
    /// Accepting events
    Open = 0,
    /// Close requested; no further events are accepted
    Closing = 1,
    /// Removed from its channel
    Closed = 2,
}

impl SubscriptionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SubscriptionState::Open,
            1 => SubscriptionState::Closing,
            _ => SubscriptionState::Closed,
        }
    }
}

/// One streaming client bound to one channel
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    channel: Arc<str>,
    state: AtomicU8,
    /// Taken on close so the receiving stream observes end-of-stream
    tx: Mutex<Option<mpsc::Sender<Event>>>,
}

impl Subscription {
    /// Create a subscription with a bounded queue
    pub fn new(
        id: SubscriptionId,
        channel: impl Into<Arc<str>>,
        capacity: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let subscription = Self {
            id,
            channel: channel.into(),
            state: AtomicU8::new(SubscriptionState::Open as u8),
            tx: Mutex::new(Some(tx)),
        };

        (Arc::new(subscription), rx)
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn state(&self) -> SubscriptionState {
        SubscriptionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SubscriptionState::Open
    }

    /// Enqueue an event without waiting
    pub fn try_send(&self, event: Event) -> Result<(), DeliveryError> {
        // State is checked under the sender lock; `begin_close` flips it
        // under the same lock.
        let guard = self.tx.lock();
        if !self.is_open() {
            return Err(DeliveryError::Closed(self.id));
        }
        let Some(tx) = guard.as_ref() else {
            return Err(DeliveryError::Closed(self.id));
        };

        tx.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull(self.id),
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed(self.id),
        })
    }

    /// Move `Open -> Closing`
    ///
    /// Returns `true` only for the single caller that performed the
    /// transition; that caller owns the removal from the channel.
    pub(crate) fn begin_close(&self) -> bool {
        let mut tx = self.tx.lock();
        let won = self
            .state
            .compare_exchange(
                SubscriptionState::Open as u8,
                SubscriptionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if won {
            // Dropping the sender wakes a stream parked in `poll_recv`.
            tx.take();
        }
        won
    }

    pub(crate) fn mark_closed(&self) {
        self.state
            .store(SubscriptionState::Closed as u8, Ordering::Release);
    }
}

/// Receiving half of a subscription
///
/// Yields events in enqueue order and ends once the subscription is closed
/// and its queue is drained.
pub struct SubscriptionStream {
    rx: mpsc::Receiver<Event>,
    subscription: Arc<Subscription>,
    channel: Arc<Channel>,
}

impl SubscriptionStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<Event>,
        subscription: Arc<Subscription>,
        channel: Arc<Channel>,
    ) -> Self {
        Self {
            rx,
            subscription,
            channel,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    pub fn subscription(&self) -> &Arc<Subscription> {
        &self.subscription
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take an already queued event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

impl Stream for SubscriptionStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        if self.channel.close_subscription(&self.subscription) {
            tracing::debug!(
                channel = %self.subscription.channel(),
                subscription = %self.subscription.id(),
                "Subscription stream dropped"
            );
        }
    }
}

impl std::fmt::Debug for SubscriptionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionStream")
            .field("subscription", &self.subscription)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_try_send_full_queue() {
        let (sub, mut rx) = Subscription::new(SubscriptionId(1), "polls", 1);

        sub.try_send(Event::publish("polls", json!(1))).unwrap();
        let result = sub.try_send(Event::publish("polls", json!(2)));
        assert_eq!(result, Err(DeliveryError::QueueFull(SubscriptionId(1))));

        assert_eq!(*rx.try_recv().unwrap().payload, json!(1));
    }

    #[test]
    fn test_begin_close_single_winner() {
        let (sub, _rx) = Subscription::new(SubscriptionId(7), "subs", 4);

        assert!(sub.begin_close());
        assert!(!sub.begin_close());
        assert_eq!(sub.state(), SubscriptionState::Closing);

        sub.mark_closed();
        assert_eq!(sub.state(), SubscriptionState::Closed);
        assert!(!sub.begin_close());
    }

    #[test]
    fn test_closed_rejects_enqueue() {
        let (sub, mut rx) = Subscription::new(SubscriptionId(2), "subs", 4);
        sub.begin_close();

        let result = sub.try_send(Event::keepalive("subs"));
        assert_eq!(result, Err(DeliveryError::Closed(SubscriptionId(2))));
        // Sender was dropped, so the receiver sees end-of-stream.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_enqueue_waiting_on_lock_sees_close() {
        let (sub, mut rx) = Subscription::new(SubscriptionId(4), "subs", 4);

        let result = std::thread::scope(|s| {
            let guard = sub.tx.lock();
            let sender = s.spawn(|| sub.try_send(Event::publish("subs", json!(1))));
            std::thread::sleep(std::time::Duration::from_millis(50));

            // Close lands while the enqueue is parked on the sender lock.
            sub.state
                .store(SubscriptionState::Closing as u8, Ordering::Release);
            drop(guard);
            sender.join().unwrap()
        });

        assert_eq!(result, Err(DeliveryError::Closed(SubscriptionId(4))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_reports_closed() {
        let (sub, rx) = Subscription::new(SubscriptionId(3), "subs", 4);
        drop(rx);

        let result = sub.try_send(Event::keepalive("subs"));
        assert_eq!(result, Err(DeliveryError::Closed(SubscriptionId(3))));
    }

    #[test]
    fn test_concurrent_close_single_winner() {
        let (sub, _rx) = Subscription::new(SubscriptionId(9), "polls", 4);

        let winners: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| sub.begin_close())).collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap() as usize)
                .sum()
        });

        assert_eq!(winners, 1);
    }
}
