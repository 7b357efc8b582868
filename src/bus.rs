use crate::service::ServiceHandle;
use crate::state::{Cause, State};
use parking_lot::RwLock;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, trace};

/// Published once for every accepted state change of a service
#[derive(Clone)]
pub struct ServiceBusMessage {
    pub service: ServiceHandle,
    pub from_state: State,
    pub to_state: State,
    pub cause: Cause,
}

impl ServiceBusMessage {
    pub fn new(service: ServiceHandle, from_state: State, to_state: State, cause: Cause) -> Self {
        Self {
            service,
            from_state,
            to_state,
            cause,
        }
    }

    /// Human-readable description of the transition
    pub fn description(&self) -> String {
        format!(
            "service {} changed from {} to {} ({})",
            self.service.id(),
            self.from_state,
            self.to_state,
            self.cause
        )
    }
}

impl fmt::Debug for ServiceBusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceBusMessage")
            .field("service", &self.service.id())
            .field("from_state", &self.from_state)
            .field("to_state", &self.to_state)
            .field("cause", &self.cause)
            .finish()
    }
}

/// Receives bus messages on the publishing thread.
///
/// Publishers hold their own service lock while delivering. The lock is
/// reentrant, so a listener may read the publishing service back on this
/// thread, but it must not block: other callers on that service wait for it.
pub trait BusListener: Send + Sync {
    fn on_message(&self, message: &ServiceBusMessage);

    /// Name used in logs
    fn listener_name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Handle returned by [`MessageBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Publish/subscribe transport for service notifications.
///
/// `publish_sync` must deliver to every current subscriber before returning.
pub trait MessageBus: Send + Sync {
    fn subscribe(&self, listener: Arc<dyn BusListener>) -> SubscriptionId;

    /// Returns false when the subscription was not known
    fn unsubscribe(&self, subscription: SubscriptionId) -> bool;

    fn publish_sync(&self, message: &ServiceBusMessage);

    fn subscriber_count(&self) -> usize;
}

/// In-process bus delivering directly on the caller's thread, in subscription order
pub struct SyncMessageBus {
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn BusListener>)>>,
    next_id: AtomicU64,
    debug_logging: bool,
}

impl SyncMessageBus {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            debug_logging: false,
        }
    }

    /// Create a bus that logs every published message
    pub fn with_debug_logging(debug_logging: bool) -> Self {
        Self {
            debug_logging,
            ..Self::new()
        }
    }
}

impl Default for SyncMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageBus for SyncMessageBus {
    fn subscribe(&self, listener: Arc<dyn BusListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        debug!(
            "Subscribing {} to message bus (subscription {})",
            listener.listener_name(),
            id.0
        );
        self.subscribers.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(id, _)| *id != subscription);
        before != subscribers.len()
    }

    fn publish_sync(&self, message: &ServiceBusMessage) {
        if self.debug_logging {
            debug!("Publishing: {}", message.description());
        }

        // Deliver outside the registry lock so listeners may subscribe or unsubscribe
        let recipients: Vec<Arc<dyn BusListener>> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in recipients {
            trace!("Delivering to {}", listener.listener_name());
            if let Err(payload) =
                panic::catch_unwind(AssertUnwindSafe(|| listener.on_message(message)))
            {
                error!(
                    "Listener {} panicked while handling '{}': {}",
                    listener.listener_name(),
                    message.description(),
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Subscribes a listener without keeping it alive; messages are dropped once it is gone
pub struct WeakListener<T: BusListener> {
    target: Weak<T>,
}

impl<T: BusListener> WeakListener<T> {
    pub fn new(target: Weak<T>) -> Self {
        Self { target }
    }
}

impl<T: BusListener> BusListener for WeakListener<T> {
    fn on_message(&self, message: &ServiceBusMessage) {
        if let Some(target) = self.target.upgrade() {
            target.on_message(message);
        }
    }

    fn listener_name(&self) -> &str {
        std::any::type_name::<T>()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockHooks, MockService};
    use crate::service::Service;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(State, State)>>,
    }

    impl BusListener for Recorder {
        fn on_message(&self, message: &ServiceBusMessage) {
            self.seen.lock().push((message.from_state, message.to_state));
        }
    }

    struct Panicker;

    impl BusListener for Panicker {
        fn on_message(&self, _message: &ServiceBusMessage) {
            panic!("listener failure");
        }
    }

    fn message_for(bus: &Arc<SyncMessageBus>) -> ServiceBusMessage {
        let service = MockService::with_defaults(MockHooks::new(), bus.clone());
        ServiceBusMessage::new(
            service.handle(),
            State::Initial,
            State::Starting,
            Cause::Started,
        )
    }

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let bus = Arc::new(SyncMessageBus::new());
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        bus.subscribe(first.clone());
        bus.subscribe(second.clone());

        bus.publish_sync(&message_for(&bus));

        assert_eq!(*first.seen.lock(), vec![(State::Initial, State::Starting)]);
        assert_eq!(*second.seen.lock(), vec![(State::Initial, State::Starting)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = Arc::new(SyncMessageBus::new());
        let recorder = Arc::new(Recorder::default());
        let subscription = bus.subscribe(recorder.clone());

        assert!(bus.unsubscribe(subscription));
        assert!(!bus.unsubscribe(subscription));

        bus.publish_sync(&message_for(&bus));
        assert!(recorder.seen.lock().is_empty());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let bus = Arc::new(SyncMessageBus::with_debug_logging(true));
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(Arc::new(Panicker));
        bus.subscribe(recorder.clone());

        bus.publish_sync(&message_for(&bus));

        assert_eq!(recorder.seen.lock().len(), 1);
    }

    #[test]
    fn test_weak_listener_ignores_dropped_target() {
        let bus = Arc::new(SyncMessageBus::new());
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(Arc::new(WeakListener::new(Arc::downgrade(&recorder))));

        let message = message_for(&bus);
        bus.publish_sync(&message);
        assert_eq!(recorder.seen.lock().len(), 1);

        drop(recorder);
        bus.publish_sync(&message);
    }

    #[test]
    fn test_message_description() {
        let bus = Arc::new(SyncMessageBus::new());
        let message = message_for(&bus);
        let description = message.description();
        assert!(description.contains(&message.service.id().to_string()));
        assert!(description.contains("INITIAL"));
        assert!(description.contains("STARTING"));
    }
}
