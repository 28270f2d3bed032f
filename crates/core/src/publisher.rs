use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CaptureError, SubscriberError};
use crate::event::NoteEvent;

/// Callback invoked for every published event.
///
/// Registrations are identified by `Arc` pointer identity, so keep a clone of
/// the `Arc` around to unsubscribe later.
pub type Subscriber = Arc<dyn Fn(&NoteEvent) -> Result<(), SubscriberError> + Send + Sync>;

/// Wrap a closure as a [`Subscriber`].
pub fn subscriber<F>(callback: F) -> Subscriber
where
    F: Fn(&NoteEvent) -> Result<(), SubscriberError> + Send + Sync + 'static,
{
    Arc::new(callback)
}

/// Result of fanning one event out to the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub delivered: usize,
    pub failed: usize,
}

/// Ordered list of subscriber callbacks.
#[derive(Default)]
pub struct EventPublisher {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a callback. The same callback may be registered more than once.
    pub fn subscribe(&self, callback: Subscriber) {
        self.subscribers.write().push(callback);
    }

    /// Remove the first registration of `callback`.
    pub fn unsubscribe(&self, callback: &Subscriber) -> Result<(), CaptureError> {
        let mut subscribers = self.subscribers.write();
        let position = subscribers
            .iter()
            .position(|s| Arc::ptr_eq(s, callback))
            .ok_or(CaptureError::SubscriberNotFound)?;
        subscribers.remove(position);
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `event` to every subscriber in registration order.
    ///
    /// A subscriber that errors or panics is logged and skipped; delivery
    /// continues with the next one.
    pub fn publish(&self, event: &NoteEvent) -> PublishOutcome {
        // Callbacks run without the lock held so they may (un)subscribe
        let subscribers = self.subscribers.read().clone();
        let mut outcome = PublishOutcome::default();

        for (index, callback) in subscribers.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => outcome.delivered += 1,
                Ok(Err(e)) => {
                    log::warn!("Subscriber {} failed on event {:?}: {}", index, event, e);
                    outcome.failed += 1;
                }
                Err(_) => {
                    log::warn!("Subscriber {} panicked on event {:?}", index, event);
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::event::EventKind;

    fn event(order: u64) -> NoteEvent {
        NoteEvent {
            order,
            note: 60,
            kind: EventKind::KeyDown,
            velocity: 100,
            timestamp: 0.0,
            global_time: None,
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Subscriber) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let callback = subscriber(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, callback)
    }

    #[test]
    fn test_publish_in_subscription_order() {
        let publisher = EventPublisher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let seen = seen.clone();
            publisher.subscribe(subscriber(move |e| {
                seen.lock().push((id, e.order));
                Ok(())
            }));
        }

        let outcome = publisher.publish(&event(7));
        assert_eq!(outcome.delivered, 3);
        assert_eq!(*seen.lock(), vec![(0, 7), (1, 7), (2, 7)]);
    }

    #[test]
    fn test_duplicate_subscription_invoked_twice() {
        let publisher = EventPublisher::new();
        let (count, callback) = counter();

        publisher.subscribe(callback.clone());
        publisher.subscribe(callback.clone());
        publisher.publish(&event(0));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // One unsubscribe removes exactly one registration
        publisher.unsubscribe(&callback).unwrap();
        assert_eq!(publisher.subscriber_count(), 1);
        publisher.publish(&event(1));
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_unknown_callback() {
        let publisher = EventPublisher::new();
        let (_, registered) = counter();
        let (_, stranger) = counter();
        publisher.subscribe(registered);

        assert!(matches!(
            publisher.unsubscribe(&stranger),
            Err(CaptureError::SubscriberNotFound)
        ));
        assert_eq!(publisher.subscriber_count(), 1);
    }

    #[test]
    fn test_failing_subscribers_are_isolated() {
        let publisher = EventPublisher::new();
        let (count, callback) = counter();

        publisher.subscribe(subscriber(|_| Err(SubscriberError::new("disk full"))));
        publisher.subscribe(subscriber(|_| panic!("misbehaving consumer")));
        publisher.subscribe(callback);

        let outcome = publisher.publish(&event(0));
        assert_eq!(
            outcome,
            PublishOutcome {
                delivered: 1,
                failed: 2
            }
        );
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscriber_can_unsubscribe_itself() {
        let publisher = Arc::new(EventPublisher::new());
        let slot: Arc<Mutex<Option<Subscriber>>> = Arc::new(Mutex::new(None));

        let publisher_clone = publisher.clone();
        let slot_clone = slot.clone();
        let callback = subscriber(move |_| {
            if let Some(me) = slot_clone.lock().take() {
                publisher_clone
                    .unsubscribe(&me)
                    .map_err(|e| SubscriberError::new(e.to_string()))?;
            }
            Ok(())
        });
        *slot.lock() = Some(callback.clone());
        publisher.subscribe(callback);

        assert_eq!(publisher.publish(&event(0)).delivered, 1);
        assert_eq!(publisher.subscriber_count(), 0);
    }
}
