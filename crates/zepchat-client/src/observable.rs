//! Minimal observable value with replay-last-value subscriptions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::mpsc;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: T,
    subscribers: Vec<(u64, Callback<T>)>,
}

/// A value that notifies subscribers every time it is published.
///
/// Subscribers are called synchronously, in registration order, from the
/// publishing task. Every publish is delivered; nothing is coalesced.
///
/// Delivery is serialized: a publish and its callbacks, or a registration and
/// its replay, run as one step, so every subscriber observes values in
/// publish order. The value lock is released before callbacks run and the
/// delivery lock is reentrant, so a callback may itself publish, subscribe or
/// unsubscribe.
pub struct Observable<T> {
    inner: Arc<Mutex<Inner<T>>>,
    delivery: ReentrantMutex<()>,
    next_id: AtomicU64,
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value: initial,
                subscribers: Vec::new(),
            })),
            delivery: ReentrantMutex::new(()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Register `callback`. It receives the current value immediately and
    /// then every later publish until the returned handle is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback<T> = Arc::new(callback);

        let _delivery = self.delivery.lock();
        let current = {
            let mut inner = self.inner.lock();
            inner.subscribers.push((id, callback.clone()));
            inner.value.clone()
        };
        callback(&current);

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().subscribers.retain(|(sid, _)| *sid != id);
                }
            })),
        }
    }

    /// Same contract as [`subscribe`](Self::subscribe), delivered through a
    /// channel for async observers. The subscription lives until the receiver
    /// is dropped.
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let weak = Arc::downgrade(&self.inner);

        let callback: Callback<T> = Arc::new(move |value: &T| {
            if tx.send(value.clone()).is_err()
                && let Some(inner) = weak.upgrade()
            {
                // Receiver dropped.
                if let Some(mut inner) = inner.try_lock() {
                    inner.subscribers.retain(|(sid, _)| *sid != id);
                }
            }
        });

        let _delivery = self.delivery.lock();
        let current = {
            let mut inner = self.inner.lock();
            inner.subscribers.push((id, callback.clone()));
            inner.value.clone()
        };
        callback(&current);
        rx
    }

    /// Replace the value and notify every subscriber.
    pub fn publish(&self, value: T) {
        self.update(|current| *current = value);
    }

    /// Mutate the value in place and notify every subscriber.
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut T),
    {
        let _delivery = self.delivery.lock();
        let (snapshot, subscribers) = {
            let mut inner = self.inner.lock();
            mutate(&mut inner.value);
            let subscribers: Vec<Callback<T>> = inner
                .subscribers
                .iter()
                .map(|(_, callback)| callback.clone())
                .collect();
            (inner.value.clone(), subscribers)
        };

        for callback in subscribers {
            callback(&snapshot);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// Handle returned by [`Observable::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    unsubscribe: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }

    /// Keep the callback registered for the lifetime of the observable.
    pub fn detach(mut self) {
        self.unsubscribe = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.unsubscribe.is_some())
            .finish()
    }
}
