//! Notification fanout.
//!
//! Owns the set of open live reload subscribers and pushes notifications to
//! all of them. A subscriber whose channel is closed or full is dropped from
//! the set on the next delivery attempt.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_stream::Stream;

/// Per-subscriber buffer size.
///
/// A client that falls this far behind is treated as broken.
const DEFAULT_CAPACITY: usize = 16;

/// Kind of notification pushed to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum NotificationKind {
    /// Sent once, right after registration.
    Connected,
    /// A watched file changed.
    Reload,
}

impl NotificationKind {
    /// Wire token carried in the `data:` field.
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Reload => "reload",
        }
    }
}

/// A single notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Notification {
    pub kind: NotificationKind,
    /// Milliseconds since the Unix epoch, strictly increasing per fanout.
    pub id: u64,
}

/// Source of strictly increasing millisecond identifiers.
///
/// Two notifications created within the same millisecond get consecutive ids.
#[derive(Debug, Default)]
struct EventClock {
    last: AtomicU64,
}

impl EventClock {
    fn next(&self) -> u64 {
        let now = now_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Set of live reload subscribers.
pub(crate) struct NotificationFanout {
    subscribers: Mutex<HashMap<u64, mpsc::Sender<Notification>>>,
    next_subscriber: AtomicU64,
    clock: EventClock,
    capacity: usize,
    /// Set by [`NotificationFanout::close_all`]; later registrations end immediately.
    closed: AtomicBool,
}

impl Default for NotificationFanout {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationFanout {
    /// Create an empty fanout.
    pub(crate) fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an empty fanout with the given per-subscriber buffer size.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_subscriber: AtomicU64::new(1),
            clock: EventClock::default(),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<Notification>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a subscriber and queue its `connected` notification.
    ///
    /// The returned subscription unregisters itself when dropped. After
    /// [`close_all`](Self::close_all) the subscription is already ended.
    pub(crate) fn register(self: &Arc<Self>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);

        {
            let mut subscribers = self.lock();
            // Checked under the lock so close_all can't slip in between
            if self.closed.load(Ordering::SeqCst) {
                drop(subscribers);
                tracing::debug!(subscriber = id, "Fanout closed, ending new subscriber");
                return Subscription {
                    id,
                    receiver: rx,
                    fanout: Arc::clone(self),
                };
            }
            subscribers.insert(id, tx.clone());
        }

        let connected = Notification {
            kind: NotificationKind::Connected,
            id: self.clock.next(),
        };
        if tx.try_send(connected).is_err() {
            // Left in the set; the next broadcast prunes it.
            tracing::debug!(subscriber = id, "Failed to queue connected notification");
        }

        Subscription {
            id,
            receiver: rx,
            fanout: Arc::clone(self),
        }
    }

    /// Push a `reload` notification to every current subscriber.
    ///
    /// Iterates a snapshot of the set, then removes every subscriber whose
    /// write failed. Returns the number of subscribers the notification was
    /// queued for.
    pub(crate) fn broadcast(&self) -> usize {
        let notification = Notification {
            kind: NotificationKind::Reload,
            id: self.clock.next(),
        };

        let snapshot: Vec<(u64, mpsc::Sender<Notification>)> = self
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        let mut failed = Vec::new();
        for (id, tx) in snapshot {
            match tx.try_send(notification) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber = id, "Live reload client not keeping up, dropping");
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = id, "Live reload client gone");
                    failed.push(id);
                }
            }
        }

        let mut subscribers = self.lock();
        for id in &failed {
            subscribers.remove(id);
        }
        let delivered = subscribers.len();
        drop(subscribers);

        tracing::info!(
            clients = delivered,
            pruned = failed.len(),
            id = notification.id,
            "Broadcasted reload"
        );
        delivered
    }

    /// Remove a subscriber. Removing an absent subscriber is a no-op.
    pub(crate) fn unregister(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            tracing::debug!(subscriber = id, "Live reload client unregistered");
        }
    }

    /// Drop every subscriber, ending their streams, and refuse new ones.
    ///
    /// Returns the number of subscribers closed.
    pub(crate) fn close_all(&self) -> usize {
        let mut subscribers = self.lock();
        self.closed.store(true, Ordering::SeqCst);
        let count = subscribers.len();
        subscribers.clear();
        count
    }

    /// Number of registered subscribers.
    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Receiving side of a registered subscriber.
///
/// Yields notifications in the order they were broadcast. The stream ends
/// once the fanout drops the subscriber.
pub(crate) struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Notification>,
    fanout: Arc<NotificationFanout>,
}

impl Subscription {
    /// Subscriber identifier within its fanout.
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl Stream for Subscription {
    type Item = Notification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.fanout.unregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio_stream::StreamExt;

    /// Drain everything currently queued without waiting.
    fn drain(subscription: &mut Subscription) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = subscription.receiver.try_recv() {
            out.push(n);
        }
        out
    }

    fn kinds(notifications: &[Notification]) -> Vec<NotificationKind> {
        notifications.iter().map(|n| n.kind).collect()
    }

    #[test]
    fn test_register_sends_connected_first() {
        let fanout = Arc::new(NotificationFanout::new());
        let mut sub = fanout.register();

        let received = drain(&mut sub);
        assert_eq!(kinds(&received), vec![NotificationKind::Connected]);
        assert_eq!(fanout.len(), 1);
    }

    #[test]
    fn test_connected_then_exactly_n_reloads() {
        let fanout = Arc::new(NotificationFanout::new());
        let mut sub = fanout.register();

        for _ in 0..5 {
            fanout.broadcast();
        }

        let received = drain(&mut sub);
        assert_eq!(received.len(), 6);
        assert_eq!(received[0].kind, NotificationKind::Connected);
        assert!(
            received[1..]
                .iter()
                .all(|n| n.kind == NotificationKind::Reload)
        );
    }

    #[test]
    fn test_ids_strictly_increase() {
        let fanout = Arc::new(NotificationFanout::new());
        let mut sub = fanout.register();
        fanout.broadcast();
        fanout.broadcast();
        fanout.broadcast();

        let ids: Vec<u64> = drain(&mut sub).iter().map(|n| n.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids: {ids:?}");
    }

    #[test]
    fn test_back_to_back_broadcasts_reach_every_subscriber_in_order() {
        let fanout = Arc::new(NotificationFanout::new());
        let mut a = fanout.register();
        let mut b = fanout.register();

        assert_eq!(fanout.broadcast(), 2);
        assert_eq!(fanout.broadcast(), 2);

        for sub in [&mut a, &mut b] {
            let received = drain(sub);
            assert_eq!(
                kinds(&received),
                vec![
                    NotificationKind::Connected,
                    NotificationKind::Reload,
                    NotificationKind::Reload
                ]
            );
            assert!(received[1].id < received[2].id);
        }
    }

    #[test]
    fn test_broadcast_after_unregister_skips_subscriber() {
        let fanout = Arc::new(NotificationFanout::new());
        let mut kept = fanout.register();
        let mut removed = fanout.register();

        fanout.unregister(removed.id());
        assert_eq!(fanout.len(), 1);

        assert_eq!(fanout.broadcast(), 1);

        assert_eq!(kinds(&drain(&mut removed)), vec![NotificationKind::Connected]);
        assert_eq!(
            kinds(&drain(&mut kept)),
            vec![NotificationKind::Connected, NotificationKind::Reload]
        );
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let fanout = Arc::new(NotificationFanout::new());
        let sub = fanout.register();
        let id = sub.id();

        fanout.unregister(id);
        fanout.unregister(id);
        fanout.unregister(9999);

        assert!(fanout.is_empty());
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let fanout = Arc::new(NotificationFanout::new());
        let sub = fanout.register();
        assert_eq!(fanout.len(), 1);

        drop(sub);

        assert!(fanout.is_empty());
        // Broadcasting to nobody is fine
        assert_eq!(fanout.broadcast(), 0);
    }

    #[test]
    fn test_broadcast_prunes_closed_subscriber() {
        let fanout = Arc::new(NotificationFanout::new());
        let mut sub = fanout.register();
        // Close the receiving side without running the Drop unregistration
        sub.receiver.close();

        assert_eq!(fanout.len(), 1);
        assert_eq!(fanout.broadcast(), 0);
        assert!(fanout.is_empty());
    }

    #[test]
    fn test_broadcast_prunes_full_subscriber() {
        let fanout = Arc::new(NotificationFanout::with_capacity(2));
        let _slow = fanout.register(); // connected fills slot 1
        let mut fast = fanout.register();

        assert_eq!(fanout.broadcast(), 2); // slow: slot 2
        drain(&mut fast);
        assert_eq!(fanout.broadcast(), 1); // slow: full, pruned

        assert_eq!(fanout.len(), 1);
        assert_eq!(kinds(&drain(&mut fast)), vec![NotificationKind::Reload]);
    }

    #[tokio::test]
    async fn test_close_all_ends_streams() {
        let fanout = Arc::new(NotificationFanout::new());
        let mut sub = fanout.register();

        assert_eq!(fanout.close_all(), 1);
        assert!(fanout.is_empty());

        // Queued notification is still delivered, then the stream ends
        assert_eq!(
            sub.next().await.map(|n| n.kind),
            Some(NotificationKind::Connected)
        );
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn test_register_after_close_all_ends_immediately() {
        let fanout = Arc::new(NotificationFanout::new());
        fanout.close_all();

        let mut late = fanout.register();

        assert!(fanout.is_empty());
        assert_eq!(late.next().await, None);
        assert_eq!(fanout.broadcast(), 0);
    }

    #[test]
    fn test_event_clock_monotonic_within_same_millisecond() {
        let clock = EventClock::default();
        let first = clock.next();
        let second = clock.next();
        let third = clock.next();

        assert!(first < second && second < third);
    }

    #[test]
    fn test_notification_kind_tokens() {
        assert_eq!(NotificationKind::Connected.as_str(), "connected");
        assert_eq!(NotificationKind::Reload.as_str(), "reload");
    }
}
