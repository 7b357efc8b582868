use super::{ManagedServiceBuilder, Service, ServiceHandle, ServiceHooks};
use crate::bus::{panic_message, BusListener, MessageBus, ServiceBusMessage, SubscriptionId, WeakListener};
use crate::error::{Result, ServiceError};
use crate::i18n::{DefaultTranslate, Translate};
use crate::key::{I18nKey, ServiceId};
use crate::rehydrate::{PersistedService, PersistedView, RehydrationContext};
use crate::state::{Cause, State};
use crate::status::ServiceStatus;
use anyhow::anyhow;
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Serialize, Serializer};
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, warn};

/// Fields guarded by the service lock
pub(crate) struct Core {
    pub(crate) state: State,
    pub(crate) cause: Cause,
    pub(crate) instance_number: u32,
    pub(crate) name_key: I18nKey,
    pub(crate) description_key: I18nKey,
}

impl Default for Core {
    fn default() -> Self {
        Self {
            state: State::Initial,
            cause: Cause::NotSpecified,
            instance_number: 0,
            name_key: I18nKey::NOT_SPECIFIED,
            description_key: I18nKey::NOT_SPECIFIED,
        }
    }
}

/// Thread-safe lifecycle state machine wrapping a set of [`ServiceHooks`].
///
/// Always handed out as an `Arc`; every notification and status carries a
/// handle to the service it describes.
///
/// The service lock is reentrant: a listener or hook running on the thread
/// that holds it may read the service back. `RefCell` borrows of the core are
/// never held across a hook call or a publish.
pub struct ManagedService<H: ServiceHooks> {
    id: ServiceId,
    core: ReentrantMutex<RefCell<Core>>,
    hooks: H,
    translate: Arc<dyn Translate>,
    bus: Arc<dyn MessageBus>,
    subscription: Mutex<Option<SubscriptionId>>,
    this: Weak<ManagedService<H>>,
}

impl<H: ServiceHooks> ManagedService<H> {
    /// Create a service in INITIAL state and subscribe it to the bus
    pub fn new(hooks: H, translate: Arc<dyn Translate>, bus: Arc<dyn MessageBus>) -> Arc<Self> {
        Self::assemble(ServiceId::new(), Core::default(), hooks, translate, bus)
    }

    /// Create a service that renders its keys with [`DefaultTranslate`]
    pub fn with_defaults(hooks: H, bus: Arc<dyn MessageBus>) -> Arc<Self> {
        Self::new(hooks, Arc::new(DefaultTranslate), bus)
    }

    pub fn builder(hooks: H) -> ManagedServiceBuilder<H> {
        ManagedServiceBuilder::new(hooks)
    }

    pub(crate) fn assemble(
        id: ServiceId,
        core: Core,
        hooks: H,
        translate: Arc<dyn Translate>,
        bus: Arc<dyn MessageBus>,
    ) -> Arc<Self> {
        let service = Arc::new_cyclic(|this| Self {
            id,
            core: ReentrantMutex::new(RefCell::new(core)),
            hooks,
            translate,
            bus,
            subscription: Mutex::new(None),
            this: this.clone(),
        });
        service.subscribe();
        service
    }

    /// Reconstruct a persisted service, re-acquiring its collaborators from `context`.
    ///
    /// Fails with a configuration error when the context is missing a
    /// collaborator. The returned instance is subscribed to the bus exactly once.
    pub fn rehydrate(persisted: PersistedService<H>, context: &RehydrationContext) -> Result<Arc<Self>> {
        context.check()?;
        let translate = context.translate()?;
        let bus = context.message_bus()?;

        let PersistedService {
            id,
            state,
            cause,
            instance_number,
            name_key,
            description_key,
            mut hooks,
        } = persisted;

        hooks.after_rehydration(context)?;

        info!(
            "Rehydrated service '{}' ({}) in state {}",
            translate.from(&name_key),
            id,
            state
        );

        let core = Core {
            state,
            cause,
            instance_number,
            name_key,
            description_key,
        };
        Ok(Self::assemble(id, core, hooks, translate, bus))
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Type-erased handle to this service
    ///
    /// # Panics
    ///
    /// Panics if called while the last `Arc` is being dropped. Every
    /// constructor returns an `Arc`, so any other caller holding `&self`
    /// keeps the instance alive.
    pub fn handle(&self) -> ServiceHandle {
        self.this
            .upgrade()
            .expect("managed service accessed without a live Arc")
    }

    /// Subscription this instance currently holds on its bus
    pub fn subscription(&self) -> Option<SubscriptionId> {
        *self.subscription.lock()
    }

    fn subscribe(&self) {
        let mut subscription = self.subscription.lock();
        if let Some(previous) = subscription.take() {
            self.bus.unsubscribe(previous);
        }
        let listener = Arc::new(WeakListener::new(self.this.clone()));
        *subscription = Some(self.bus.subscribe(listener));
    }

    fn status(&self, core: &RefCell<Core>) -> ServiceStatus {
        let (state, cause) = {
            let core = core.borrow();
            (core.state, core.cause)
        };
        ServiceStatus::new(self.handle(), state, cause)
    }

    fn display_name(&self, core: &RefCell<Core>) -> String {
        self.translate.from(&core.borrow().name_key)
    }

    fn current_state(core: &RefCell<Core>) -> State {
        core.borrow().state
    }

    /// Cause only changes together with a state change
    fn set_state(&self, core: &RefCell<Core>, state: State, cause: Cause) {
        let previous = {
            let mut core = core.borrow_mut();
            if core.state == state {
                return;
            }
            let previous = core.state;
            core.state = state;
            core.cause = cause;
            previous
        };
        debug!(
            "'{}' service has changed status from {} to {}",
            self.display_name(core),
            previous,
            state
        );
        self.publish_status_change(previous, state, cause);
    }

    fn publish_status_change(&self, from: State, to: State, cause: Cause) {
        let message = ServiceBusMessage::new(self.handle(), from, to, cause);
        debug!("Publishing ServiceBusMessage, state changed from {} to {}", from, to);
        self.bus.publish_sync(&message);

        if let Err(payload) =
            panic::catch_unwind(AssertUnwindSafe(|| self.hooks.on_transition(&message)))
        {
            error!(
                "on_transition hook panicked for service {}: {}",
                self.id,
                panic_message(payload.as_ref())
            );
        }
    }

    fn run_hook<F>(&self, hook: &str, f: F) -> anyhow::Result<()>
    where
        F: FnOnce(&H) -> anyhow::Result<()>,
    {
        match panic::catch_unwind(AssertUnwindSafe(|| f(&self.hooks))) {
            Ok(result) => result,
            Err(payload) => Err(anyhow!(
                "{} hook panicked: {}",
                hook,
                panic_message(payload.as_ref())
            )),
        }
    }

    fn stop_with(&self, cause: Cause) -> ServiceStatus {
        let core = self.core.lock();
        let name = self.display_name(&core);

        match Self::current_state(&core) {
            state @ (State::Stopped | State::Stopping | State::Failed | State::Resetting) => {
                debug!(
                    "Attempting to stop service {}, but it is already {}. No action taken",
                    name, state
                );
                return self.status(&core);
            }
            State::Initial => {
                debug!("Service {} is in INITIAL state, stop or fail ignored", name);
                return self.status(&core);
            }
            _ => {}
        }

        info!("Stopping service: {} ({})", name, cause);
        self.set_state(&core, State::Stopping, cause);

        match self.run_hook("on_stop", |hooks| hooks.on_stop()) {
            Ok(()) => self.set_state(&core, cause.stop_state(), cause),
            Err(e) => {
                error!("Error occurred while trying to stop {}: {:#}", name, e);
                if cause == Cause::Failed {
                    // already failed, not merely failed to stop
                    self.set_state(&core, State::Failed, Cause::Failed);
                } else {
                    self.set_state(&core, State::Failed, Cause::FailedToStop);
                }
            }
        }

        self.status(&core)
    }

    /// Force the state without running hooks or publishing
    #[cfg(test)]
    pub(crate) fn force_state(&self, state: State) {
        self.core.lock().borrow_mut().state = state;
    }
}

impl<H: ServiceHooks> Service for ManagedService<H> {
    fn id(&self) -> ServiceId {
        self.id
    }

    fn state(&self) -> State {
        self.core.lock().borrow().state
    }

    fn cause(&self) -> Cause {
        self.core.lock().borrow().cause
    }

    fn is_started(&self) -> bool {
        self.state() == State::Running
    }

    fn is_stopped(&self) -> bool {
        self.state() == State::Stopped
    }

    fn instance_number(&self) -> u32 {
        self.core.lock().borrow().instance_number
    }

    fn set_instance_number(&self, instance_number: u32) {
        self.core.lock().borrow_mut().instance_number = instance_number;
    }

    fn name_key(&self) -> I18nKey {
        self.core.lock().borrow().name_key.clone()
    }

    fn set_name_key(&self, name_key: I18nKey) {
        self.core.lock().borrow_mut().name_key = name_key;
    }

    fn description_key(&self) -> I18nKey {
        self.core.lock().borrow().description_key.clone()
    }

    fn set_description_key(&self, description_key: I18nKey) {
        self.core.lock().borrow_mut().description_key = description_key;
    }

    fn name(&self) -> String {
        let core = self.core.lock();
        self.display_name(&core)
    }

    fn description(&self) -> String {
        let core = self.core.lock();
        let key = core.borrow().description_key.clone();
        self.translate.from(&key)
    }

    fn start(&self) -> Result<ServiceStatus> {
        let core = self.core.lock();
        let name = self.display_name(&core);

        match Self::current_state(&core) {
            State::Running | State::Starting => {
                debug!("{} already started, no action taken", name);
                return Ok(self.status(&core));
            }
            State::Stopping => {
                warn!("Rejected start() of {} while STOPPING", name);
                return Err(ServiceError::illegal_transition(
                    name,
                    State::Stopping,
                    "Cannot start() when state is STOPPING",
                ));
            }
            State::Failed => {
                warn!("Rejected start() of {} while FAILED", name);
                return Err(ServiceError::illegal_transition(
                    name,
                    State::Failed,
                    "Cannot start() when state is FAILED. Call reset() first",
                ));
            }
            _ => {}
        }

        info!("Starting service: {}", name);
        self.set_state(&core, State::Starting, Cause::Started);

        match self.run_hook("on_start", |hooks| hooks.on_start()) {
            Ok(()) => self.set_state(&core, State::Running, Cause::Started),
            Err(e) => {
                error!("Error occurred while trying to start service {}: {:#}", name, e);
                self.set_state(&core, State::Failed, Cause::FailedToStart);
            }
        }

        Ok(self.status(&core))
    }

    fn stop(&self) -> ServiceStatus {
        self.stop_with(Cause::Stopped)
    }

    fn fail(&self) -> ServiceStatus {
        self.stop_with(Cause::Failed)
    }

    fn reset(&self) -> Result<ServiceStatus> {
        let core = self.core.lock();
        let name = self.display_name(&core);

        match Self::current_state(&core) {
            state @ (State::Initial | State::Resetting) => {
                debug!("Service {} is already {}, reset ignored", name, state);
                return Ok(self.status(&core));
            }
            state if !state.is_resettable() => {
                warn!("Rejected reset() of {} while {}", name, state);
                return Err(ServiceError::illegal_transition(
                    name,
                    state,
                    "Must be in a STOPPED or FAILED state before reset()",
                ));
            }
            _ => {}
        }

        info!("Resetting service: {}", name);
        self.set_state(&core, State::Resetting, Cause::Reset);

        match self.run_hook("on_reset", |hooks| hooks.on_reset()) {
            Ok(()) => self.set_state(&core, State::Initial, Cause::Reset),
            Err(e) => {
                error!("Error while trying to reset {}: {:#}", name, e);
                self.set_state(&core, State::Failed, Cause::FailedToReset);
            }
        }

        Ok(self.status(&core))
    }
}

impl<H: ServiceHooks> BusListener for ManagedService<H> {
    fn on_message(&self, message: &ServiceBusMessage) {
        // own transitions are delivered through on_transition while the lock is held
        if message.service.id() == self.id {
            return;
        }
        self.hooks.on_bus_message(message);
    }

    fn listener_name(&self) -> &str {
        "managed_service"
    }
}

impl<H: ServiceHooks + Serialize> Serialize for ManagedService<H> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let guard = self.core.lock();
        let core = guard.borrow();
        PersistedView {
            id: self.id,
            state: core.state,
            cause: core.cause,
            instance_number: core.instance_number,
            name_key: &core.name_key,
            description_key: &core.description_key,
            hooks: &self.hooks,
        }
        .serialize(serializer)
    }
}

impl<H: ServiceHooks> Drop for ManagedService<H> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            self.bus.unsubscribe(subscription);
        }

        // Last resort: nothing should drop a running service, but release its resources if it happens
        let (running, name) = {
            let core = self.core.get_mut().get_mut();
            (core.state == State::Running, self.translate.from(&core.name_key))
        };
        if running {
            warn!("Service {} dropped while RUNNING, running stop hook", name);
            if let Err(e) = self.run_hook("on_stop", |hooks| hooks.on_stop()) {
                error!("Stop hook failed while dropping {}: {:#}", name, e);
            }
        }
    }
}
