//! Change propagation bus
//!
//! A process-wide publish/subscribe channel keyed by property name
//! (case-insensitive) plus a wildcard channel for type-definition changes.
//! Publication is synchronous: every live subscriber runs before `publish`
//! returns, once per call, with no batching or deduplication.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};

/// What changed about a property
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeKind {
    /// Settings for the property were written
    Updated,
    /// The property's record moved away to `next`
    RenamedTo { next: String },
    /// The property's record arrived from `previous`
    RenamedFrom { previous: String },
    /// The property's record was deleted
    Deleted,
    /// The set of registered type definitions changed (wildcard only)
    TypeDefinitions,
}

/// One change notification
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    /// Lowercased property name; empty for type-definition changes
    pub property: String,
    pub kind: ChangeKind,
}

type Handler = Arc<dyn Fn(&PropertyChange) + Send + Sync>;

struct BusInner {
    next_id: u64,
    /// Per-property subscribers, keyed by lowercased name
    channels: HashMap<String, Vec<(u64, Handler)>>,
    /// Wildcard subscribers, notified for every change
    wildcard: Vec<(u64, Handler)>,
}

/// Process-wide notification channel for property changes
///
/// Cheap to clone (shared interior). Subscribing returns an RAII guard;
/// views drop their guards on teardown so the handler count converges to
/// zero once every view referencing a property is closed.
#[derive(Clone)]
pub struct PropertyEventBus {
    inner: Arc<RwLock<BusInner>>,
}

impl PropertyEventBus {
    /// Create a bus with no subscribers
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(BusInner {
                next_id: 0,
                channels: HashMap::new(),
                wildcard: Vec::new(),
            })),
        }
    }

    /// Subscribe to changes for one property (case-insensitive)
    pub fn subscribe(
        &self,
        property: &str,
        handler: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> Subscription {
        let key = property.to_lowercase();
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .channels
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(handler)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            channel: Some(key),
            id,
        }
    }

    /// Subscribe to every change, including type-definition changes
    pub fn subscribe_all(
        &self,
        handler: impl Fn(&PropertyChange) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.wildcard.push((id, Arc::new(handler)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            channel: None,
            id,
        }
    }

    /// Publish one change, synchronously invoking every subscriber for the
    /// property and every wildcard subscriber, in subscription order.
    pub fn publish(&self, change: &PropertyChange) {
        // Snapshot the handler list so handlers may subscribe/unsubscribe
        // reentrantly without deadlocking on the bus lock.
        let mut handlers: Vec<(u64, Handler)> = {
            let inner = self.inner.read().unwrap();
            let named = inner
                .channels
                .get(&change.property)
                .into_iter()
                .flatten()
                .cloned();
            named.chain(inner.wildcard.iter().cloned()).collect()
        };
        handlers.sort_by_key(|(id, _)| *id);

        for (_, handler) in handlers {
            handler(change);
        }
    }

    /// Publish a settings change for one property
    pub fn publish_updated(&self, property: &str) {
        self.publish(&PropertyChange {
            property: property.to_lowercase(),
            kind: ChangeKind::Updated,
        });
    }

    /// Publish a type-definition change on the wildcard channel
    pub fn publish_type_definitions(&self) {
        self.publish(&PropertyChange {
            property: String::new(),
            kind: ChangeKind::TypeDefinitions,
        });
    }

    /// Number of live subscribers for a property (excludes wildcard)
    pub fn handler_count(&self, property: &str) -> usize {
        let inner = self.inner.read().unwrap();
        inner
            .channels
            .get(&property.to_lowercase())
            .map(|v| v.len())
            .unwrap_or(0)
    }

    /// Number of live wildcard subscribers
    pub fn wildcard_count(&self) -> usize {
        self.inner.read().unwrap().wildcard.len()
    }
}

impl Default for PropertyEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one subscription
///
/// Dropping the guard (or calling [`Subscription::unsubscribe`]) removes
/// the handler. Removal is idempotent and order-independent.
pub struct Subscription {
    bus: Weak<RwLock<BusInner>>,
    channel: Option<String>,
    id: u64,
}

impl Subscription {
    /// Remove the handler now instead of at drop time
    pub fn unsubscribe(&mut self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut inner = bus.write().unwrap();
        match &self.channel {
            Some(key) => {
                if let Some(handlers) = inner.channels.get_mut(key) {
                    handlers.retain(|(id, _)| *id != self.id);
                    if handlers.is_empty() {
                        inner.channels.remove(key);
                    }
                }
            }
            None => inner.wildcard.retain(|(id, _)| *id != self.id),
        }
        // Disarm so a later drop is a no-op
        self.bus = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_bus() -> (PropertyEventBus, Arc<Mutex<Vec<String>>>) {
        (PropertyEventBus::new(), Arc::new(Mutex::new(Vec::new())))
    }

    fn record(log: &Arc<Mutex<Vec<String>>>, tag: &str) -> impl Fn(&PropertyChange) + Send + Sync {
        let log = Arc::clone(log);
        let tag = tag.to_string();
        move |_| log.lock().unwrap().push(tag.clone())
    }

    #[test]
    fn fan_out_invokes_all_in_subscription_order() {
        let (bus, log) = recording_bus();
        let _a = bus.subscribe("status", record(&log, "a"));
        let _b = bus.subscribe("status", record(&log, "b"));
        let _c = bus.subscribe("status", record(&log, "c"));

        bus.publish_updated("status");

        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn subscription_order_interleaves_wildcard() {
        let (bus, log) = recording_bus();
        let _a = bus.subscribe("status", record(&log, "named-1"));
        let _w = bus.subscribe_all(record(&log, "wild"));
        let _b = bus.subscribe("status", record(&log, "named-2"));

        bus.publish_updated("status");

        assert_eq!(*log.lock().unwrap(), vec!["named-1", "wild", "named-2"]);
    }

    #[test]
    fn property_names_are_case_insensitive() {
        let (bus, log) = recording_bus();
        let _sub = bus.subscribe("Status", record(&log, "hit"));

        bus.publish_updated("STATUS");
        bus.publish_updated("status");

        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn each_publish_is_one_full_cycle() {
        let (bus, log) = recording_bus();
        let _sub = bus.subscribe("p", record(&log, "x"));

        bus.publish_updated("p");
        bus.publish_updated("p");
        bus.publish_updated("p");

        // No batching or deduplication within a task
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[test]
    fn handler_count_converges_to_zero() {
        let bus = PropertyEventBus::new();
        let a = bus.subscribe("p", |_| {});
        let b = bus.subscribe("p", |_| {});
        assert_eq!(bus.handler_count("p"), 2);

        drop(a);
        assert_eq!(bus.handler_count("p"), 1);
        drop(b);
        assert_eq!(bus.handler_count("p"), 0);
    }

    #[test]
    fn explicit_unsubscribe_then_drop_is_safe() {
        let bus = PropertyEventBus::new();
        let mut sub = bus.subscribe("p", |_| {});
        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(bus.handler_count("p"), 0);
        drop(sub);
        assert_eq!(bus.handler_count("p"), 0);
    }

    #[test]
    fn wildcard_sees_type_definition_changes() {
        let (bus, log) = recording_bus();
        let _named = bus.subscribe("p", record(&log, "named"));
        let _wild = bus.subscribe_all(record(&log, "wild"));

        bus.publish_type_definitions();

        assert_eq!(*log.lock().unwrap(), vec!["wild"]);
    }

    #[test]
    fn handlers_may_unsubscribe_reentrantly() {
        let bus = PropertyEventBus::new();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        *victim.lock().unwrap() = Some(bus.subscribe("p", |_| {}));

        let slot = Arc::clone(&victim);
        let _killer = bus.subscribe("p", move |_| {
            // Dropping another subscription from inside a handler must not
            // deadlock the bus.
            slot.lock().unwrap().take();
        });

        bus.publish_updated("p");
        assert_eq!(bus.handler_count("p"), 1);
    }
}
