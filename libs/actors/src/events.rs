//! Lifecycle-event notification.
//!
//! Parts raise events as side effects of runtime transitions and
//! processing; observers (statistics collectors, checkpoint triggers)
//! subscribe without coupling the runtime to any of them. Delivery is
//! best-effort and isolated per listener: one failing listener never
//! prevents its siblings from running and never crashes the raising task.

use crate::part::PartId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// Kinds of lifecycle events a part raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartEventKind {
    /// An item was accepted into the part's mailbox.
    Received,
    /// An item's processing task completed successfully.
    Processed,
    /// An item's processing task failed or its result was refused downstream.
    ProcessingFailed,
}

impl fmt::Display for PartEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartEventKind::Received => write!(f, "received"),
            PartEventKind::Processed => write!(f, "processed"),
            PartEventKind::ProcessingFailed => write!(f, "processing_failed"),
        }
    }
}

/// One lifecycle notification.
#[derive(Debug, Clone)]
pub struct PartEvent<T> {
    pub kind: PartEventKind,
    pub payload: T,
    pub source: PartId,
    /// Failure detail, set only for `ProcessingFailed`.
    pub error: Option<String>,
}

impl<T> PartEvent<T> {
    pub fn new(kind: PartEventKind, payload: T, source: PartId) -> Self {
        Self {
            kind,
            payload,
            source,
            error: None,
        }
    }

    pub fn failed(payload: T, source: PartId, reason: impl Into<String>) -> Self {
        Self {
            kind: PartEventKind::ProcessingFailed,
            payload,
            source,
            error: Some(reason.into()),
        }
    }
}

/// An observer of part lifecycle events.
pub trait PartEventListener<T>: Send + Sync {
    fn on_event(&self, event: &PartEvent<T>);
}

impl<T, F> PartEventListener<T> for F
where
    F: Fn(&PartEvent<T>) + Send + Sync,
{
    fn on_event(&self, event: &PartEvent<T>) {
        self(event)
    }
}

/// Per-part registry of lifecycle-event listeners.
///
/// Registration is expected before the part starts; the registry is
/// synchronized independently of actor state, so registering against a
/// running part is tolerated and never corrupts the registry.
pub struct EventBus<T> {
    listeners: RwLock<HashMap<PartEventKind, Vec<Arc<dyn PartEventListener<T>>>>>,
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
        }
    }

    /// Register a listener for one event kind. Listeners for a kind are
    /// invoked in registration order.
    pub fn subscribe(&self, kind: PartEventKind, listener: Arc<dyn PartEventListener<T>>) {
        self.listeners.write().entry(kind).or_default().push(listener);
    }

    pub fn listener_count(&self, kind: PartEventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to every listener registered for its kind.
    ///
    /// A panicking listener is reported and skipped; remaining listeners
    /// still run.
    pub fn raise(&self, event: &PartEvent<T>) {
        let snapshot = {
            let listeners = self.listeners.read();
            match listeners.get(&event.kind) {
                Some(registered) => registered.clone(),
                None => return,
            }
        };

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener.on_event(event))).is_err() {
                warn!(
                    part_id = %event.source,
                    event_kind = %event.kind,
                    "event listener panicked; continuing with remaining listeners"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn collector(seen: Arc<Mutex<Vec<i64>>>) -> Arc<dyn PartEventListener<i64>> {
        Arc::new(move |event: &PartEvent<i64>| {
            seen.lock().push(event.payload);
        })
    }

    #[test]
    fn delivers_to_listeners_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in [1i64, 2, 3] {
            let order = Arc::clone(&order);
            bus.subscribe(
                PartEventKind::Processed,
                Arc::new(move |_: &PartEvent<i64>| order.lock().push(tag)),
            );
        }

        assert_eq!(bus.listener_count(PartEventKind::Processed), 3);
        bus.raise(&PartEvent::new(PartEventKind::Processed, 0, PartId::new("p")));
        assert_eq!(*order.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn only_matching_kind_is_notified() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(PartEventKind::Received, collector(Arc::clone(&seen)));

        bus.raise(&PartEvent::new(PartEventKind::Processed, 5, PartId::new("p")));
        assert!(seen.lock().is_empty());

        bus.raise(&PartEvent::new(PartEventKind::Received, 5, PartId::new("p")));
        assert_eq!(*seen.lock(), vec![5]);
    }

    #[test]
    fn panicking_listener_does_not_stop_siblings() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            PartEventKind::Processed,
            Arc::new(|_: &PartEvent<i64>| panic!("listener bug")),
        );
        bus.subscribe(PartEventKind::Processed, collector(Arc::clone(&seen)));

        bus.raise(&PartEvent::new(PartEventKind::Processed, 9, PartId::new("p")));
        assert_eq!(*seen.lock(), vec![9]);
    }

    #[test]
    fn failure_events_carry_the_reason() {
        let event = PartEvent::failed(3i64, PartId::new("p"), "downstream refused");
        assert_eq!(event.kind, PartEventKind::ProcessingFailed);
        assert_eq!(event.error.as_deref(), Some("downstream refused"));
    }
}
