//! Typed publish/subscribe channel for session notifications.
//!
//! Listeners are invoked synchronously, in subscription order. Subscribing
//! returns a [`Disposable`] that removes exactly that subscription; disposing
//! twice is harmless.
//!
//! A listener subscribed while a publish is in progress is not guaranteed to
//! see the value being published, but always sees the next one. Publishing
//! works on a snapshot of the listener list, so listeners may subscribe or
//! dispose from inside a callback.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use thiserror::Error;

/// A shared listener callback.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Error returned by [`EventChannel::publish`] when listeners panicked.
///
/// Every listener still ran; this only reports the ones that failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("{failed} of {total} listeners panicked: {message}")]
    ListenerPanicked {
        /// Number of listeners that panicked.
        failed: usize,
        /// Number of listeners invoked.
        total: usize,
        /// Panic message of the first failing listener.
        message: String,
    },
}

struct Entry<T> {
    id: u64,
    listener: Listener<T>,
}

struct Listeners<T> {
    entries: Mutex<Vec<Entry<T>>>,
    next_id: AtomicU64,
}

trait Unsubscribe: Send + Sync {
    fn remove(&self, id: u64) -> bool;
}

impl<T> Unsubscribe for Listeners<T> {
    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Handle that cancels one subscription.
///
/// Dropping a `Disposable` does not unsubscribe.
pub struct Disposable {
    target: Weak<dyn Unsubscribe>,
    id: u64,
}

impl Disposable {
    /// Remove the subscription. Calling this again is a no-op.
    pub fn dispose(&self) {
        if let Some(target) = self.target.upgrade() {
            target.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Disposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposable").field("id", &self.id).finish()
    }
}

/// Publish/subscribe channel carrying values of type `T`.
pub struct EventChannel<T> {
    listeners: Arc<Listeners<T>>,
}

impl<T: 'static> EventChannel<T> {
    /// Create a channel with no listeners.
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Listeners {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribe a closure.
    pub fn subscribe<F>(&self, listener: F) -> Disposable
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe_listener(Arc::new(listener))
    }

    /// Subscribe a shared listener.
    ///
    /// The same listener may be subscribed more than once; each subscription
    /// is delivered to and disposed of independently.
    pub fn subscribe_listener(&self, listener: Listener<T>) -> Disposable {
        let id = self.listeners.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Entry { id, listener });

        let weak: Weak<Listeners<T>> = Arc::downgrade(&self.listeners);
        let target: Weak<dyn Unsubscribe> = weak;
        Disposable { target, id }
    }

    /// Deliver `value` to every listener in subscription order.
    ///
    /// A panicking listener does not stop delivery to the others. Returns the
    /// number of listeners invoked, or [`PublishError`] if any panicked.
    pub fn publish(&self, value: &T) -> Result<usize, PublishError> {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| Arc::clone(&entry.listener))
            .collect();

        let total = snapshot.len();
        let mut failed = 0;
        let mut first_message = None;

        for listener in snapshot {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(value))) {
                failed += 1;
                if first_message.is_none() {
                    first_message = Some(panic_message(payload.as_ref()));
                }
            }
        }

        match first_message {
            None => Ok(total),
            Some(message) => Err(PublishError::ListenerPanicked {
                failed,
                total,
                message,
            }),
        }
    }

    /// Number of active subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Subscribe-only view of this channel.
    pub fn event(&self) -> Event<'_, T> {
        Event { channel: self }
    }
}

impl<T: 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Subscribe-only view of an [`EventChannel`].
pub struct Event<'a, T> {
    channel: &'a EventChannel<T>,
}

impl<T: 'static> Event<'_, T> {
    /// Subscribe a closure.
    pub fn subscribe<F>(&self, listener: F) -> Disposable
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.channel.subscribe(listener)
    }

    /// Subscribe a shared listener.
    pub fn subscribe_listener(&self, listener: Listener<T>) -> Disposable {
        self.channel.subscribe_listener(listener)
    }
}
