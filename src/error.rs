use crate::state::State;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Illegal transition for service '{service}' in state {state}: {message}")]
    IllegalTransition {
        service: String,
        state: State,
        message: String,
    },

    #[error("Service configuration error: {message}")]
    Configuration { message: String },

    #[error("Service key '{key}' is already registered")]
    DuplicateServiceKey { key: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn illegal_transition<S: Into<String>, M: Into<String>>(
        service: S,
        state: State,
        message: M,
    ) -> Self {
        Self::IllegalTransition {
            service: service.into(),
            state,
            message: message.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// True for errors raised because a lifecycle call was made from the wrong state
    pub fn is_illegal_transition(&self) -> bool {
        matches!(self, Self::IllegalTransition { .. })
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;
