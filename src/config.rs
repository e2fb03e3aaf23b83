//! Machine configuration.

use crate::builder::ConfigurationError;
use crate::core::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};

/// Name used for machines that are not given one.
pub const DEFAULT_MACHINE_NAME: &str = "StateMachine";

/// Runtime settings for a state machine.
///
/// Every field has a default, so partial JSON documents are accepted.
///
/// # Example
///
/// ```rust
/// use nestor::MachineConfig;
///
/// let config = MachineConfig::from_json(r#"{ "name": "CoffeeMaker", "queue_capacity": 8 }"#).unwrap();
/// assert_eq!(config.name, "CoffeeMaker");
/// assert_eq!(config.queue_capacity, 8);
/// assert_eq!(config.history_limit, 64);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Name attached to every log record of the machine
    pub name: String,

    /// Event queue capacity; `0` means unbounded
    pub queue_capacity: usize,

    /// Number of transitions kept in the history; `0` disables it
    pub history_limit: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MACHINE_NAME.to_string(),
            queue_capacity: 0,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::InvalidConfig(e.to_string()))
    }

    pub fn is_bounded(&self) -> bool {
        self.queue_capacity > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unbounded() {
        let config = MachineConfig::default();

        assert_eq!(config.name, DEFAULT_MACHINE_NAME);
        assert!(!config.is_bounded());
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn empty_json_uses_defaults() {
        let config = MachineConfig::from_json("{}").unwrap();
        assert_eq!(config, MachineConfig::default());
    }

    #[test]
    fn invalid_json_is_a_configuration_error() {
        let result = MachineConfig::from_json(r#"{ "queue_capacity": "lots" }"#);
        assert!(matches!(result, Err(ConfigurationError::InvalidConfig(_))));
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = MachineConfig {
            name: "Turnstile".to_string(),
            queue_capacity: 1,
            history_limit: 0,
        };

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(MachineConfig::from_json(&json).unwrap(), config);
    }
}
