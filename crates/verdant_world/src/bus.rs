//! Event bus fanning out newly committed records to local subscribers.
//!
//! Delivery is synchronous, in subscription order, exactly once per
//! subscriber per publish. A panicking subscriber is isolated: the panic is
//! caught and reported, and delivery continues with the next subscriber.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub panicked: Vec<u64>,
}

impl PublishReport {
    fn merge(&mut self, other: PublishReport) {
        self.delivered += other.delivered;
        self.panicked.extend(other.panicked);
    }
}

struct BusState<T> {
    next_id: u64,
    subscribers: Vec<(u64, Handler<T>)>,
}

impl<T> Default for BusState<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            subscribers: Vec::new(),
        }
    }
}

pub struct EventBus<T> {
    state: Arc<Mutex<BusState<T>>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
        }
    }

    /// Registers `handler` for all subsequent publishes until unsubscribed.
    pub fn subscribe(&self, handler: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let mut state = self.state.lock().expect("lock bus state");
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.push((id, Arc::new(handler)));
        Subscription(id)
    }

    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        let mut state = self.state.lock().expect("lock bus state");
        let before = state.subscribers.len();
        state.subscribers.retain(|(id, _)| *id != subscription.0);
        state.subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        let state = self.state.lock().expect("lock bus state");
        state.subscribers.len()
    }

    /// Delivers `item` to all current subscribers in subscription order.
    pub fn publish(&self, item: &T) -> PublishReport {
        let subscribers = {
            let state = self.state.lock().expect("lock bus state");
            state.subscribers.clone()
        };
        let mut report = PublishReport::default();
        for (id, handler) in subscribers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(item)));
            match outcome {
                Ok(()) => report.delivered += 1,
                Err(_) => {
                    tracing::warn!(subscriber = id, "subscriber panicked during publish");
                    report.panicked.push(id);
                }
            }
        }
        report
    }

    /// Delivers items in sequence order; each item is fully delivered to all
    /// subscribers before the next item starts.
    pub fn publish_all(&self, items: &[T]) -> PublishReport {
        let mut report = PublishReport::default();
        for item in items {
            report.merge(self.publish(item));
        }
        report
    }
}
