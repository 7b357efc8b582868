//! Passive registry of the most recent status of every observed service.
//!
//! Services are registered automatically the first time one of their state
//! change notifications reaches the monitor.

use crate::bus::{panic_message, BusListener, MessageBus, ServiceBusMessage, SubscriptionId, WeakListener};
use crate::key::ServiceId;
use crate::service::ServiceHandle;
use crate::state::State;
use crate::status::ServiceStatusRecord;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info};

pub trait ServiceMonitor: Send + Sync {
    /// Every service seen so far, in the order first observed
    fn monitored_services(&self) -> Vec<ServiceHandle>;

    /// Most recent record for `service`, or an empty record if none was made
    fn service_status(&self, service: &ServiceHandle) -> ServiceStatusRecord;

    /// Ask every known service to stop. One service failing does not prevent the others from being asked.
    fn stop_all_services(&self);
}

#[derive(Default)]
struct MonitorState {
    records: HashMap<ServiceId, ServiceStatusRecord>,
    order: Vec<ServiceHandle>,
}

/// Default [`ServiceMonitor`] fed from a [`MessageBus`]
pub struct DefaultServiceMonitor {
    state: Mutex<MonitorState>,
    bus: Arc<dyn MessageBus>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl DefaultServiceMonitor {
    /// Create a monitor and subscribe it to `bus`
    pub fn new(bus: Arc<dyn MessageBus>) -> Arc<Self> {
        let monitor = Arc::new(Self {
            state: Mutex::new(MonitorState::default()),
            bus: Arc::clone(&bus),
            subscription: Mutex::new(None),
        });
        let listener = Arc::new(WeakListener::new(Arc::downgrade(&monitor)));
        *monitor.subscription.lock() = Some(bus.subscribe(listener));
        monitor
    }

    /// Services whose most recent recorded state is `state`
    pub fn services_in_state(&self, state: State) -> Vec<ServiceHandle> {
        let monitor = self.state.lock();
        monitor
            .order
            .iter()
            .filter(|service| {
                monitor
                    .records
                    .get(&service.id())
                    .map(|record| record.current_state == state)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn record(&self, message: &ServiceBusMessage) {
        let now = Utc::now();
        let id = message.service.id();
        let mut monitor = self.state.lock();

        let record = match monitor.records.get(&id) {
            Some(previous) => previous.advance(message.to_state, now),
            None => {
                debug!("Monitor registering service {}", id);
                monitor.order.push(Arc::clone(&message.service));
                ServiceStatusRecord::first(
                    Arc::clone(&message.service),
                    message.from_state,
                    message.to_state,
                    now,
                )
            }
        };
        monitor.records.insert(id, record);
    }
}

impl ServiceMonitor for DefaultServiceMonitor {
    fn monitored_services(&self) -> Vec<ServiceHandle> {
        self.state.lock().order.clone()
    }

    fn service_status(&self, service: &ServiceHandle) -> ServiceStatusRecord {
        self.state
            .lock()
            .records
            .get(&service.id())
            .cloned()
            .unwrap_or_else(|| ServiceStatusRecord::empty(Arc::clone(service)))
    }

    fn stop_all_services(&self) {
        // Stopping publishes back into this monitor, so work on a copy
        let services = self.monitored_services();
        info!("Stopping all {} monitored services", services.len());

        for service in services {
            let id = service.id();
            match panic::catch_unwind(AssertUnwindSafe(|| service.stop())) {
                Ok(status) => debug!("Service {} stopped with state {}", id, status.state),
                Err(payload) => error!(
                    "Stopping service {} panicked: {}",
                    id,
                    panic_message(payload.as_ref())
                ),
            }
        }
    }
}

impl BusListener for DefaultServiceMonitor {
    fn on_message(&self, message: &ServiceBusMessage) {
        self.record(message);
    }

    fn listener_name(&self) -> &str {
        "service_monitor"
    }
}

impl Drop for DefaultServiceMonitor {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            self.bus.unsubscribe(subscription);
        }
    }
}
