//! Event Hub - listener registry plus broadcast fan-out for one delay
//!
//! Listeners are called synchronously from `emit`. The broadcast channel mirrors
//! every event for subscribers that read at their own pace.

use std::cell::RefCell;
use std::rc::Rc;

use tokio::sync::broadcast;
use tracing::debug;

use super::types::{DelayEvent, EventKind};

/// Default broadcast capacity (events)
/// A delay emits a single terminal event, so this only matters for manual `emit` calls
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

type Listener = Rc<dyn Fn(&DelayEvent)>;

struct Registration {
    kind: EventKind,
    once: bool,
    listener: Listener,
}

/// Closed publish/subscribe object with `finish` and `error` channels
pub struct EventHub {
    registrations: RefCell<Vec<Registration>>,
    tx: broadcast::Sender<DelayEvent>,
}

impl EventHub {
    /// Create a new hub with the given broadcast capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventHub::new: creating event hub");
        let (tx, _) = broadcast::channel(capacity);
        Self {
            registrations: RefCell::new(Vec::new()),
            tx,
        }
    }

    /// Create a new hub with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Register a listener called for every event of `kind`
    pub fn on<F>(&self, kind: EventKind, listener: F)
    where
        F: Fn(&DelayEvent) + 'static,
    {
        self.register(kind, false, Rc::new(listener));
    }

    /// Register a listener called for the next event of `kind` only
    pub fn once<F>(&self, kind: EventKind, listener: F)
    where
        F: FnOnce(&DelayEvent) + 'static,
    {
        let slot = RefCell::new(Some(listener));
        self.register(
            kind,
            true,
            Rc::new(move |event: &DelayEvent| {
                if let Some(listener) = slot.borrow_mut().take() {
                    listener(event);
                }
            }),
        );
    }

    fn register(&self, kind: EventKind, once: bool, listener: Listener) {
        debug!(%kind, once, "EventHub::register");
        self.registrations
            .borrow_mut()
            .push(Registration { kind, once, listener });
    }

    /// Deliver an event to matching listeners, then to broadcast subscribers
    ///
    /// Once-listeners are unregistered before any listener runs, so a listener
    /// that emits again cannot fire them twice. Listeners may register new
    /// listeners; those only see later events.
    pub fn emit(&self, event: DelayEvent) {
        let kind = event.kind();
        let fired: Vec<Listener> = {
            let mut registrations = self.registrations.borrow_mut();
            let mut fired = Vec::new();
            registrations.retain(|r| {
                if r.kind != kind {
                    return true;
                }
                fired.push(Rc::clone(&r.listener));
                !r.once
            });
            fired
        };
        debug!(%kind, listeners = fired.len(), "EventHub::emit");

        for listener in fired {
            listener(&event);
        }

        // Ignore send errors (no subscribers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to every event emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<DelayEvent> {
        debug!("EventHub::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Number of registered listeners for `kind`
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.registrations.borrow().iter().filter(|r| r.kind == kind).count()
    }

    /// Number of active broadcast subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DelayError;
    use serde_json::json;
    use std::cell::Cell;
    use tokio::sync::broadcast::error::TryRecvError;

    #[test]
    fn test_on_fires_every_time() {
        let hub = EventHub::new(8);
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        hub.on(EventKind::Finish, move |_| seen.set(seen.get() + 1));

        hub.emit(DelayEvent::Finish(vec![]));
        hub.emit(DelayEvent::Finish(vec![]));

        assert_eq!(count.get(), 2);
        assert_eq!(hub.listener_count(EventKind::Finish), 1);
    }

    #[test]
    fn test_once_fires_only_once() {
        let hub = EventHub::new(8);
        let count = Rc::new(Cell::new(0));
        let seen = Rc::clone(&count);
        hub.once(EventKind::Error, move |_| seen.set(seen.get() + 1));

        hub.emit(DelayEvent::Error(DelayError::Stalled));
        hub.emit(DelayEvent::Error(DelayError::Stalled));

        assert_eq!(count.get(), 1);
        assert_eq!(hub.listener_count(EventKind::Error), 0);
    }

    #[test]
    fn test_listeners_filtered_by_kind() {
        let hub = EventHub::new(8);
        let finished = Rc::new(Cell::new(false));
        let errored = Rc::new(Cell::new(false));
        let f = Rc::clone(&finished);
        let e = Rc::clone(&errored);
        hub.on(EventKind::Finish, move |_| f.set(true));
        hub.on(EventKind::Error, move |_| e.set(true));

        hub.emit(DelayEvent::Finish(vec![json!(1)]));

        assert!(finished.get());
        assert!(!errored.get());
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let hub = EventHub::new(8);
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            hub.once(EventKind::Finish, move |_| order.borrow_mut().push(i));
        }

        hub.emit(DelayEvent::Finish(vec![]));

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_listener_may_register_listener() {
        let hub = Rc::new(EventHub::new(8));
        let count = Rc::new(Cell::new(0));
        let inner_hub = Rc::clone(&hub);
        let inner_count = Rc::clone(&count);
        hub.once(EventKind::Finish, move |_| {
            let c = Rc::clone(&inner_count);
            inner_hub.once(EventKind::Finish, move |_| c.set(c.get() + 1));
        });

        hub.emit(DelayEvent::Finish(vec![]));
        assert_eq!(count.get(), 0);

        hub.emit(DelayEvent::Finish(vec![]));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_broadcast_subscriber_receives_events() {
        let hub = EventHub::new(8);
        let mut rx = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        hub.emit(DelayEvent::Finish(vec![json!("x")]));

        let event = rx.try_recv().unwrap();
        assert_eq!(event, DelayEvent::Finish(vec![json!("x")]));
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_emit_without_listeners_or_subscribers() {
        let hub = EventHub::default();
        // This should not panic with nobody listening
        hub.emit(DelayEvent::Error(DelayError::Idle));
    }
}
