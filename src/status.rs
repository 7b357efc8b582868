use crate::service::ServiceHandle;
use crate::state::{Cause, State};
use chrono::{DateTime, Utc};
use std::fmt;

/// Snapshot of a service returned by every lifecycle call, taken after the call completed
#[derive(Clone)]
pub struct ServiceStatus {
    pub service: ServiceHandle,
    pub state: State,
    pub cause: Cause,
}

impl ServiceStatus {
    pub fn new(service: ServiceHandle, state: State, cause: Cause) -> Self {
        Self {
            service,
            state,
            cause,
        }
    }
}

impl fmt::Debug for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceStatus")
            .field("service", &self.service.id())
            .field("state", &self.state)
            .field("cause", &self.cause)
            .finish()
    }
}

impl PartialEq for ServiceStatus {
    fn eq(&self, other: &Self) -> bool {
        self.service.id() == other.service.id()
            && self.state == other.state
            && self.cause == other.cause
    }
}

/// Most recent status of a service as recorded by the monitor
#[derive(Clone)]
pub struct ServiceStatusRecord {
    pub service: ServiceHandle,
    pub current_state: State,
    pub previous_state: State,
    pub last_start_time: DateTime<Utc>,
    pub last_stop_time: DateTime<Utc>,
    pub status_change_time: DateTime<Utc>,
    /// True when no notification has been seen for the service yet
    pub empty: bool,
}

impl ServiceStatusRecord {
    /// Placeholder returned for services the monitor has never heard of
    pub fn empty(service: ServiceHandle) -> Self {
        Self {
            service,
            current_state: State::NotSpecified,
            previous_state: State::NotSpecified,
            last_start_time: DateTime::<Utc>::MIN_UTC,
            last_stop_time: DateTime::<Utc>::MIN_UTC,
            status_change_time: DateTime::<Utc>::MIN_UTC,
            empty: true,
        }
    }

    /// First record for a service, built from its first observed transition
    pub fn first(service: ServiceHandle, from: State, to: State, at: DateTime<Utc>) -> Self {
        Self {
            service,
            current_state: to,
            previous_state: from,
            last_start_time: if to == State::Running {
                at
            } else {
                DateTime::<Utc>::MIN_UTC
            },
            last_stop_time: if matches!(to, State::Stopped | State::Failed) {
                at
            } else {
                DateTime::<Utc>::MIN_UTC
            },
            status_change_time: at,
            empty: false,
        }
    }

    /// Successor record after the service moved to `to`
    pub fn advance(&self, to: State, at: DateTime<Utc>) -> Self {
        Self {
            service: self.service.clone(),
            current_state: to,
            previous_state: self.current_state,
            last_start_time: if to == State::Running {
                at
            } else {
                self.last_start_time
            },
            last_stop_time: if matches!(to, State::Stopped | State::Failed) {
                at
            } else {
                self.last_stop_time
            },
            status_change_time: at,
            empty: false,
        }
    }
}

impl fmt::Debug for ServiceStatusRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceStatusRecord")
            .field("service", &self.service.id())
            .field("current_state", &self.current_state)
            .field("previous_state", &self.previous_state)
            .field("last_start_time", &self.last_start_time)
            .field("last_stop_time", &self.last_stop_time)
            .field("status_change_time", &self.status_change_time)
            .field("empty", &self.empty)
            .finish()
    }
}
