use crate::bus::ServiceBusMessage;
use crate::config::ServiceDefinition;
use crate::error::Result;
use crate::rehydrate::RehydrationContext;
use crate::service::{ManagedService, ServiceHooks};
use crate::state::State;
use anyhow::bail;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Service backed by [`MockHooks`]
pub type MockService = ManagedService<MockHooks>;

/// Scripted hooks for tests and demos.
///
/// Counts hook calls, records every state this service moved through, and can
/// be told to fail or to take its time in each hook.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(from = "MockHooksState", into = "MockHooksState")]
pub struct MockHooks {
    calls_to_start: AtomicUsize,
    calls_to_stop: AtomicUsize,
    calls_to_reset: AtomicUsize,
    fail_to_start: AtomicBool,
    fail_to_stop: AtomicBool,
    fail_to_reset: AtomicBool,
    start_delay: Duration,
    stop_delay: Duration,
    status_history: Mutex<Vec<State>>,
    foreign_messages: AtomicUsize,
    rehydrated: bool,
}

impl MockHooks {
    pub fn new() -> Self {
        Self {
            status_history: Mutex::new(vec![State::Initial]),
            ..Self::default()
        }
    }

    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn set_fail_to_start(&self, fail: bool) {
        self.fail_to_start.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_to_stop(&self, fail: bool) {
        self.fail_to_stop.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_to_reset(&self, fail: bool) {
        self.fail_to_reset.store(fail, Ordering::SeqCst);
    }

    pub fn calls_to_start(&self) -> usize {
        self.calls_to_start.load(Ordering::SeqCst)
    }

    pub fn calls_to_stop(&self) -> usize {
        self.calls_to_stop.load(Ordering::SeqCst)
    }

    pub fn calls_to_reset(&self) -> usize {
        self.calls_to_reset.load(Ordering::SeqCst)
    }

    /// States this service has been in, starting with INITIAL
    pub fn status_history(&self) -> Vec<State> {
        self.status_history.lock().clone()
    }

    /// Number of notifications seen from other services
    pub fn foreign_messages(&self) -> usize {
        self.foreign_messages.load(Ordering::SeqCst)
    }

    /// True once the hooks went through rehydration
    pub fn is_rehydrated(&self) -> bool {
        self.rehydrated
    }
}

impl ServiceHooks for MockHooks {
    fn on_start(&self) -> anyhow::Result<()> {
        self.calls_to_start.fetch_add(1, Ordering::SeqCst);
        if self.fail_to_start.load(Ordering::SeqCst) {
            bail!("Mocked failure during a call to on_start()");
        }
        if !self.start_delay.is_zero() {
            thread::sleep(self.start_delay);
        }
        Ok(())
    }

    fn on_stop(&self) -> anyhow::Result<()> {
        self.calls_to_stop.fetch_add(1, Ordering::SeqCst);
        if self.fail_to_stop.load(Ordering::SeqCst) {
            bail!("Mocked failure during a call to on_stop()");
        }
        if !self.stop_delay.is_zero() {
            thread::sleep(self.stop_delay);
        }
        Ok(())
    }

    fn on_reset(&self) -> anyhow::Result<()> {
        self.calls_to_reset.fetch_add(1, Ordering::SeqCst);
        if self.fail_to_reset.load(Ordering::SeqCst) {
            bail!("Mocked failure during a call to on_reset()");
        }
        Ok(())
    }

    fn on_transition(&self, message: &ServiceBusMessage) {
        self.status_history.lock().push(message.to_state);
    }

    fn on_bus_message(&self, message: &ServiceBusMessage) {
        debug!("Mock service observed {}", message.description());
        self.foreign_messages.fetch_add(1, Ordering::SeqCst);
    }

    fn after_rehydration(&mut self, _context: &RehydrationContext) -> Result<()> {
        self.rehydrated = true;
        Ok(())
    }
}

impl From<&ServiceDefinition> for MockHooks {
    fn from(definition: &ServiceDefinition) -> Self {
        let hooks = MockHooks::new()
            .with_start_delay(Duration::from_millis(definition.start_delay_ms))
            .with_stop_delay(Duration::from_millis(definition.stop_delay_ms));
        hooks.set_fail_to_start(definition.fail_to_start);
        hooks.set_fail_to_stop(definition.fail_to_stop);
        hooks.set_fail_to_reset(definition.fail_to_reset);
        hooks
    }
}

/// Plain-value form of [`MockHooks`] used for persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockHooksState {
    pub calls_to_start: usize,
    pub calls_to_stop: usize,
    pub calls_to_reset: usize,
    pub fail_to_start: bool,
    pub fail_to_stop: bool,
    pub fail_to_reset: bool,
    pub start_delay_ms: u64,
    pub stop_delay_ms: u64,
    pub status_history: Vec<State>,
}

impl From<MockHooksState> for MockHooks {
    fn from(state: MockHooksState) -> Self {
        Self {
            calls_to_start: AtomicUsize::new(state.calls_to_start),
            calls_to_stop: AtomicUsize::new(state.calls_to_stop),
            calls_to_reset: AtomicUsize::new(state.calls_to_reset),
            fail_to_start: AtomicBool::new(state.fail_to_start),
            fail_to_stop: AtomicBool::new(state.fail_to_stop),
            fail_to_reset: AtomicBool::new(state.fail_to_reset),
            start_delay: Duration::from_millis(state.start_delay_ms),
            stop_delay: Duration::from_millis(state.stop_delay_ms),
            status_history: Mutex::new(state.status_history),
            foreign_messages: AtomicUsize::new(0),
            rehydrated: false,
        }
    }
}

impl From<MockHooks> for MockHooksState {
    fn from(hooks: MockHooks) -> Self {
        Self::from(&hooks)
    }
}

impl From<&MockHooks> for MockHooksState {
    fn from(hooks: &MockHooks) -> Self {
        Self {
            calls_to_start: hooks.calls_to_start(),
            calls_to_stop: hooks.calls_to_stop(),
            calls_to_reset: hooks.calls_to_reset(),
            fail_to_start: hooks.fail_to_start.load(Ordering::SeqCst),
            fail_to_stop: hooks.fail_to_stop.load(Ordering::SeqCst),
            fail_to_reset: hooks.fail_to_reset.load(Ordering::SeqCst),
            start_delay_ms: hooks.start_delay.as_millis() as u64,
            stop_delay_ms: hooks.stop_delay.as_millis() as u64,
            status_history: hooks.status_history(),
        }
    }
}

impl Clone for MockHooks {
    fn clone(&self) -> Self {
        MockHooksState::from(self).into()
    }
}
