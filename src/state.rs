use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle position of a service. Exactly one is current per instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Initial,
    Starting,
    Running,
    Stopping,
    Stopped,
    Resetting,
    Failed,
    /// Placeholder used by empty monitor records, never a transition target
    #[serde(rename = "not_specified")]
    NotSpecified,
}

impl State {
    /// Resting states from which `reset()` is legal
    pub fn is_resettable(&self) -> bool {
        matches!(self, State::Stopped | State::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Initial => "INITIAL",
            State::Starting => "STARTING",
            State::Running => "RUNNING",
            State::Stopping => "STOPPING",
            State::Stopped => "STOPPED",
            State::Resetting => "RESETTING",
            State::Failed => "FAILED",
            State::NotSpecified => "not_specified",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the most recent transition happened. Always written together with [`State`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cause {
    Started,
    Stopped,
    Failed,
    FailedToStart,
    FailedToStop,
    Reset,
    FailedToReset,
    #[serde(rename = "not_specified")]
    NotSpecified,
}

impl Cause {
    /// The resting state a stop triggered with this cause settles in
    pub fn stop_state(&self) -> State {
        match self {
            Cause::Failed | Cause::FailedToStop => State::Failed,
            _ => State::Stopped,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Cause::Failed | Cause::FailedToStart | Cause::FailedToStop | Cause::FailedToReset
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cause::Started => "STARTED",
            Cause::Stopped => "STOPPED",
            Cause::Failed => "FAILED",
            Cause::FailedToStart => "FAILED_TO_START",
            Cause::FailedToStop => "FAILED_TO_STOP",
            Cause::Reset => "RESET",
            Cause::FailedToReset => "FAILED_TO_RESET",
            Cause::NotSpecified => "not_specified",
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_state_from_cause() {
        assert_eq!(Cause::Stopped.stop_state(), State::Stopped);
        assert_eq!(Cause::Failed.stop_state(), State::Failed);
        assert_eq!(Cause::FailedToStop.stop_state(), State::Failed);
        assert_eq!(Cause::Reset.stop_state(), State::Stopped);
    }

    #[test]
    fn test_state_predicates() {
        assert!(State::Failed.is_resettable());
        assert!(!State::Initial.is_resettable());
        assert!(Cause::FailedToReset.is_failure());
        assert!(!Cause::Reset.is_failure());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(
            serde_json::to_string(&State::Running).unwrap(),
            "\"RUNNING\""
        );
        assert_eq!(
            serde_json::to_string(&Cause::FailedToReset).unwrap(),
            "\"FAILED_TO_RESET\""
        );
        let state: State = serde_json::from_str("\"not_specified\"").unwrap();
        assert_eq!(state, State::NotSpecified);
        assert_eq!(Cause::FailedToStart.to_string(), "FAILED_TO_START");
    }
}
