use thiserror::Error;

use crate::core::types::Tick;

#[derive(Error, Debug)]
pub enum EmergenceError {
    #[error("Invalid configuration: {parameter} = {value} ({reason})")]
    Configuration {
        parameter: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Out-of-order tick in {component}: tick {tick} arrived after tick {last}")]
    Ordering {
        component: &'static str,
        tick: Tick,
        last: Tick,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl EmergenceError {
    /// Build a configuration error for a rejected structural parameter
    pub fn config(parameter: &'static str, value: impl ToString, reason: &'static str) -> Self {
        EmergenceError::Configuration {
            parameter,
            value: value.to_string(),
            reason,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, EmergenceError::Configuration { .. })
    }

    pub fn is_ordering(&self) -> bool {
        matches!(self, EmergenceError::Ordering { .. })
    }
}

pub type Result<T> = std::result::Result<T, EmergenceError>;
