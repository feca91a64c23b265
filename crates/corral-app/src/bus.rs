//! Event bus (C2, §4.2): typed in-process pub/sub with per-subscriber fault
//! isolation.
//!
//! Each subscriber gets its own unbounded channel and a dedicated background task
//! draining it in order, so one slow or panicking handler can never starve or break
//! delivery to any other subscriber. `publish` takes a copy-on-publish snapshot of
//! the subscriber list (§5, §9) so subscribing/unsubscribing during a publish never
//! contends with readers.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use corral_core::events::Event;
use tokio::sync::mpsc;
use tracing::error;

/// Which event type a subscriber wants to hear about. Mirrors `Event`'s variants
/// (§4.2's "recognized event types at minimum").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    DeviceConnected,
    DeviceDisconnected,
    SessionStarted,
    SessionStopped,
    SessionFailed,
}

fn matches(kind: EventKind, event: &Event) -> bool {
    matches!(
        (kind, event),
        (EventKind::DeviceConnected, Event::DeviceConnected { .. })
            | (EventKind::DeviceDisconnected, Event::DeviceDisconnected { .. })
            | (EventKind::SessionStarted, Event::SessionStarted { .. })
            | (EventKind::SessionStopped, Event::SessionStopped { .. })
            | (EventKind::SessionFailed, Event::SessionFailed { .. })
    )
}

/// Cancellation handle for `EventBus::unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle(u64);

#[derive(Clone)]
struct Subscriber {
    id: u64,
    kind: EventKind,
    tx: mpsc::UnboundedSender<Event>,
}

struct Inner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
}

/// Cheaply cloneable handle to the bus; every component that needs to publish or
/// subscribe holds one of these.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Registers `handler` for events of `kind`. `handler` runs on a dedicated task
    /// so events for this subscriber are always delivered in publish order (§4.2),
    /// and a panic inside it is caught, logged, and never propagated to the
    /// publisher or to other subscribers.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionHandle
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
                if let Err(panic) = result {
                    let msg = panic_message(&panic);
                    error!("event bus subscriber {id} panicked handling an event: {msg}");
                }
            }
        });

        self.inner
            .subscribers
            .write()
            .expect("event bus subscribers lock poisoned")
            .push(Subscriber { id, kind, tx });

        SubscriptionHandle(id)
    }

    /// Removes a subscriber. Events already queued for it before this call still
    /// get delivered (its background task drains its channel to completion); no
    /// new events reach it after this returns.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.inner
            .subscribers
            .write()
            .expect("event bus subscribers lock poisoned")
            .retain(|s| s.id != handle.0);
    }

    /// Dispatches `event` to every subscriber registered for its kind at the time
    /// of this call. Non-blocking: publishing never waits for a handler to run.
    pub fn publish(&self, event: Event) {
        let snapshot: Vec<Subscriber> = self
            .inner
            .subscribers
            .read()
            .expect("event bus subscribers lock poisoned")
            .clone();

        for subscriber in snapshot {
            if matches(subscriber.kind, &event) {
                // An Err here means the subscriber's task has already exited
                // (e.g. the process is shutting down); nothing to do about it.
                let _ = subscriber.tx.send(event.clone());
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .expect("event bus subscribers lock poisoned")
            .len()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corral_core::device::{DeviceKind, Platform};
    use corral_core::Device;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn sample_device(id: &str) -> Device {
        Device::new(Platform::Android, id, "Pixel", DeviceKind::Physical)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn subscriber_receives_every_publish_in_order() {
        let bus = EventBus::new();
        let received = Arc::new(std::sync::Mutex::new(Vec::new()));
        let received_clone = received.clone();

        bus.subscribe(EventKind::DeviceConnected, move |event| {
            if let Event::DeviceConnected { device } = event {
                received_clone.lock().unwrap().push(device.id);
            }
        });

        for i in 0..5 {
            bus.publish(Event::DeviceConnected {
                device: sample_device(&format!("d{i}")),
            });
        }
        settle().await;

        let got = received.lock().unwrap().clone();
        assert_eq!(got, vec!["d0", "d1", "d2", "d3", "d4"]);
    }

    #[tokio::test]
    async fn subscriber_only_sees_its_own_event_kind() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(EventKind::DeviceConnected, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Event::DeviceDisconnected {
            device: sample_device("d1"),
        });
        bus.publish(Event::DeviceConnected {
            device: sample_device("d2"),
        });
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let handle = bus.subscribe(EventKind::DeviceConnected, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Event::DeviceConnected {
            device: sample_device("d1"),
        });
        settle().await;
        bus.unsubscribe(handle);
        bus.publish(Event::DeviceConnected {
            device: sample_device("d2"),
        });
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn a_panicking_subscriber_does_not_break_the_bus_for_others() {
        let bus = EventBus::new();
        bus.subscribe(EventKind::DeviceConnected, |_| {
            panic!("boom");
        });

        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(EventKind::DeviceConnected, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        for i in 0..100 {
            bus.publish(Event::DeviceConnected {
                device: sample_device(&format!("d{i}")),
            });
        }
        settle().await;

        assert_eq!(count.load(Ordering::SeqCst), 100);
    }
}
