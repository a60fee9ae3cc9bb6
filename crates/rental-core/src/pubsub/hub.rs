//! In-process change hub: fan-out of change events to registered callbacks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::RwLock;

use rental_proto::{ChangeEvent, ChangeFilter};

use super::subscription::{ChangeCallback, SubscriptionEntry, SubscriptionHandle};
use crate::error::StoreError;
use crate::ports::ChangeFeed;

struct HubInner {
    /// Active subscriptions keyed by subscription ID. Ordered so delivery
    /// follows subscription order.
    subscriptions: RwLock<BTreeMap<u64, Arc<SubscriptionEntry>>>,
    /// Next subscription ID.
    next_subscription_id: AtomicU64,
}

/// Fan-out point for change events.
///
/// Transports push decoded events in with [`publish`](Self::publish); each
/// matching subscription's callback runs once per event, synchronously and in
/// publish order. Cloning yields another handle to the same hub.
#[derive(Clone)]
pub struct ChangeHub {
    inner: Arc<HubInner>,
}

impl ChangeHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscriptions: RwLock::new(BTreeMap::new()),
                next_subscription_id: AtomicU64::new(1),
            }),
        }
    }

    /// Register a callback and return its subscription ID.
    pub fn register(&self, filter: ChangeFilter, callback: ChangeCallback) -> u64 {
        let subscription_id = self
            .inner
            .next_subscription_id
            .fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            subscription_id,
            schema = %filter.schema,
            table = %filter.table,
            event = %filter.event,
            "subscription created"
        );

        let entry = SubscriptionEntry::new(subscription_id, filter, callback);
        self.inner
            .subscriptions
            .write()
            .insert(subscription_id, Arc::new(entry));

        subscription_id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn remove(&self, subscription_id: u64) -> bool {
        remove_from(&self.inner, subscription_id)
    }

    /// Register a callback and wrap it in a handle that removes it on release.
    pub fn subscribe_local(&self, filter: ChangeFilter, callback: ChangeCallback) -> SubscriptionHandle {
        let subscription_id = self.register(filter, callback);
        let hub = Arc::downgrade(&self.inner);
        SubscriptionHandle::new(subscription_id, move || remove_weak(&hub, subscription_id))
    }

    /// Deliver `event` to every matching subscription. Returns how many
    /// callbacks ran.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let targets: Vec<Arc<SubscriptionEntry>> = {
            let subs = self.inner.subscriptions.read();
            subs.values()
                .filter(|entry| entry.filter.matches(event))
                .cloned()
                .collect()
        };

        for entry in &targets {
            (entry.callback)(event);
            entry.record_event();
        }

        tracing::trace!(
            table = %event.table,
            change_type = ?event.change_type,
            delivered = targets.len(),
            "published change event"
        );

        targets.len()
    }

    /// Deliver `event` to one subscription only, if it still exists and its
    /// filter matches. Used by transports that route per channel.
    pub fn deliver(&self, subscription_id: u64, event: &ChangeEvent) -> bool {
        let entry = match self.get_subscription(subscription_id) {
            Some(entry) if entry.filter.matches(event) => entry,
            _ => return false,
        };

        (entry.callback)(event);
        entry.record_event();
        true
    }

    /// Get the number of active subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscriptions.read().len()
    }

    /// Get a subscription by ID.
    pub fn get_subscription(&self, subscription_id: u64) -> Option<Arc<SubscriptionEntry>> {
        self.inner.subscriptions.read().get(&subscription_id).cloned()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChangeFeed for ChangeHub {
    async fn subscribe(
        &self,
        filter: ChangeFilter,
        callback: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError> {
        Ok(self.subscribe_local(filter, callback))
    }
}

fn remove_weak(hub: &Weak<HubInner>, subscription_id: u64) {
    if let Some(inner) = hub.upgrade() {
        remove_from(&inner, subscription_id);
    }
}

fn remove_from(inner: &HubInner, subscription_id: u64) -> bool {
    let entry = inner.subscriptions.write().remove(&subscription_id);
    match entry {
        Some(entry) => {
            tracing::debug!(
                subscription_id,
                table = %entry.filter.table,
                events_delivered = entry.events_delivered(),
                "subscription removed"
            );
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rental_proto::{ChangeType, EventFilter};
    use serde_json::json;

    fn reservation_event(change_type: ChangeType, status: &str) -> ChangeEvent {
        ChangeEvent::new(
            "public",
            "reservations",
            change_type,
            json!({ "id": "r-1", "status": status }),
        )
    }

    fn recorder() -> (ChangeCallback, Arc<Mutex<Vec<ChangeEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ChangeCallback = Arc::new(move |event| sink.lock().push(event.clone()));
        (callback, seen)
    }

    #[test]
    fn test_register_and_remove() {
        let hub = ChangeHub::new();
        let (callback, _) = recorder();

        let id = hub.register(ChangeFilter::reservations(), callback);
        assert_eq!(hub.subscription_count(), 1);
        assert_eq!(hub.get_subscription(id).unwrap().filter.table, "reservations");

        assert!(hub.remove(id));
        assert!(!hub.remove(id));
        assert_eq!(hub.subscription_count(), 0);
        assert!(hub.get_subscription(id).is_none());
    }

    #[test]
    fn test_publish_in_order() {
        let hub = ChangeHub::new();
        let (callback, seen) = recorder();
        let _handle = hub.subscribe_local(ChangeFilter::reservations(), callback);

        hub.publish(&reservation_event(ChangeType::Insert, "pending"));
        hub.publish(&reservation_event(ChangeType::Update, "confirmed"));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].change_type, ChangeType::Insert);
        assert_eq!(seen[1].new_record["status"], "confirmed");
    }

    #[test]
    fn test_no_delivery_without_subscription() {
        let hub = ChangeHub::new();
        assert_eq!(hub.publish(&reservation_event(ChangeType::Insert, "pending")), 0);
    }

    #[test]
    fn test_filter_scopes_delivery() {
        let hub = ChangeHub::new();
        let (callback, seen) = recorder();
        let _handle = hub.subscribe_local(
            ChangeFilter::reservations().with_event(EventFilter::Only(ChangeType::Delete)),
            callback,
        );

        hub.publish(&reservation_event(ChangeType::Update, "confirmed"));
        hub.publish(&ChangeEvent::new("public", "customers", ChangeType::Delete, json!({})));
        assert!(seen.lock().is_empty());

        hub.publish(&reservation_event(ChangeType::Delete, "cancelled"));
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = ChangeHub::new();
        let (callback, seen) = recorder();
        let handle = hub.subscribe_local(ChangeFilter::reservations(), callback);

        hub.publish(&reservation_event(ChangeType::Update, "confirmed"));
        handle.unsubscribe();
        hub.publish(&reservation_event(ChangeType::Update, "completed"));

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(hub.subscription_count(), 0);
    }

    #[test]
    fn test_multiple_subscriptions() {
        let hub = ChangeHub::new();
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();
        let first_handle = hub.subscribe_local(ChangeFilter::reservations(), first);
        let _second_handle = hub.subscribe_local(ChangeFilter::reservations(), second);

        assert_eq!(hub.publish(&reservation_event(ChangeType::Update, "confirmed")), 2);

        let entry = hub.get_subscription(first_handle.id()).unwrap();
        assert_eq!(entry.events_delivered(), 1);

        drop(first_handle);
        assert_eq!(hub.publish(&reservation_event(ChangeType::Update, "completed")), 1);
        assert_eq!(first_seen.lock().len(), 1);
        assert_eq!(second_seen.lock().len(), 2);
    }

    #[test]
    fn test_deliver_targets_one_subscription() {
        let hub = ChangeHub::new();
        let (first, first_seen) = recorder();
        let (second, second_seen) = recorder();
        let first_id = hub.register(ChangeFilter::reservations(), first);
        let _second_id = hub.register(ChangeFilter::reservations(), second);

        assert!(hub.deliver(first_id, &reservation_event(ChangeType::Update, "confirmed")));
        assert!(!hub.deliver(first_id, &ChangeEvent::new("public", "customers", ChangeType::Insert, json!({}))));
        assert_eq!(first_seen.lock().len(), 1);
        assert!(second_seen.lock().is_empty());

        hub.remove(first_id);
        assert!(!hub.deliver(first_id, &reservation_event(ChangeType::Update, "completed")));
    }

    #[tokio::test]
    async fn test_change_feed_impl() {
        let hub = ChangeHub::new();
        let (callback, seen) = recorder();
        let handle = ChangeFeed::subscribe(&hub, ChangeFilter::reservations(), callback)
            .await
            .unwrap();

        hub.publish(&reservation_event(ChangeType::Insert, "pending"));
        assert_eq!(seen.lock().len(), 1);
        handle.unsubscribe();
        assert_eq!(hub.subscription_count(), 0);
    }
}
