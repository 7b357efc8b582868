//! Service abstraction and the lifecycle state machine behind it.
//!
//! A service is constructed cheaply in [`State::Initial`] and is then driven
//! through `start`, `stop`, `fail` and `reset`. Concrete behaviour lives in a
//! [`ServiceHooks`] implementation; [`ManagedService`] supplies the guarded
//! transitions, the locking and the notifications.

mod builder;
mod managed;


pub use builder::ManagedServiceBuilder;
pub use managed::ManagedService;

use crate::bus::ServiceBusMessage;
use crate::error::Result;
use crate::key::{I18nKey, ServiceId, ServiceKey};
use crate::rehydrate::RehydrationContext;
use crate::state::{Cause, State};
use crate::status::ServiceStatus;
use std::sync::Arc;

/// Shared, type-erased reference to a service
pub type ServiceHandle = Arc<dyn Service>;

/// A managed component with an explicit lifecycle.
///
/// All accessors and lifecycle calls of one instance are serialized on a
/// single lock owned by that instance.
pub trait Service: Send + Sync {
    /// Instance identity; readable without taking the service lock
    fn id(&self) -> ServiceId;

    fn state(&self) -> State;

    /// Cause of the last state change
    fn cause(&self) -> Cause;

    /// True if and only if the state is RUNNING
    fn is_started(&self) -> bool;

    /// True if and only if the state is STOPPED
    fn is_stopped(&self) -> bool;

    fn instance_number(&self) -> u32;

    fn set_instance_number(&self, instance_number: u32);

    fn name_key(&self) -> I18nKey;

    fn set_name_key(&self, name_key: I18nKey);

    fn description_key(&self) -> I18nKey;

    fn set_description_key(&self, description_key: I18nKey);

    /// Name key rendered by the translation collaborator
    fn name(&self) -> String;

    fn description(&self) -> String;

    fn service_key(&self) -> ServiceKey {
        ServiceKey::new(self.name_key())
    }

    /// Starts the service.
    ///
    /// Fails with an illegal-transition error when STOPPING or FAILED. A failing
    /// start hook is reported through the returned status, not as an error.
    fn start(&self) -> Result<ServiceStatus>;

    /// Stops the service, settling in STOPPED, or FAILED if the stop hook fails
    fn stop(&self) -> ServiceStatus;

    /// Stops the service because of a failure detected outside of it
    fn fail(&self) -> ServiceStatus;

    /// Returns a STOPPED or FAILED service to INITIAL
    fn reset(&self) -> Result<ServiceStatus>;
}

/// Work performed by a concrete service during its transitions.
///
/// `on_start`, `on_stop` and `on_reset` run while the service lock is held,
/// so concurrent lifecycle calls on the same instance wait for them. Returning
/// an error (or panicking) moves the service to FAILED.
pub trait ServiceHooks: Send + Sync + 'static {
    fn on_start(&self) -> anyhow::Result<()>;

    fn on_stop(&self) -> anyhow::Result<()>;

    fn on_reset(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after each of this service's own notifications has been published.
    ///
    /// The service lock is still held; reading the service back is fine.
    fn on_transition(&self, _message: &ServiceBusMessage) {}

    /// Notifications published by other services on the same bus
    fn on_bus_message(&self, _message: &ServiceBusMessage) {}

    /// Re-populate transient state after the service was reconstructed from persisted form
    fn after_rehydration(&mut self, _context: &RehydrationContext) -> Result<()> {
        Ok(())
    }
}
