//! Subscription tracking and disposal.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rental_proto::{ChangeEvent, ChangeFilter};

/// Callback invoked once per delivered change event.
pub type ChangeCallback = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// A subscription entry tracking an active subscription.
pub struct SubscriptionEntry {
    /// Unique subscription ID.
    pub id: u64,
    /// Scope of the subscription.
    pub filter: ChangeFilter,
    /// Callback receiving matching events.
    pub callback: ChangeCallback,
    events_delivered: AtomicU64,
}

impl SubscriptionEntry {
    /// Create a new subscription entry.
    pub fn new(id: u64, filter: ChangeFilter, callback: ChangeCallback) -> Self {
        Self {
            id,
            filter,
            callback,
            events_delivered: AtomicU64::new(0),
        }
    }

    /// Number of events delivered so far.
    pub fn events_delivered(&self) -> u64 {
        self.events_delivered.load(Ordering::Relaxed)
    }

    pub(crate) fn record_event(&self) {
        self.events_delivered.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for SubscriptionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionEntry")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .field("events_delivered", &self.events_delivered())
            .finish()
    }
}

/// Handle to a live subscription.
///
/// Calling [`unsubscribe`](Self::unsubscribe) or dropping the handle runs the
/// disposer exactly once; no callback is invoked for events published after
/// that.
pub struct SubscriptionHandle {
    id: u64,
    disposer: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl SubscriptionHandle {
    /// Create a handle that runs `disposer` when released.
    pub fn new(id: u64, disposer: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            disposer: Some(Box::new(disposer)),
        }
    }

    /// Subscription ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Terminate the subscription.
    pub fn unsubscribe(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("active", &self.disposer.is_some())
            .finish()
    }
}
