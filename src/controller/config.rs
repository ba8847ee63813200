//! Controller tuning knobs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::broadcast::DEFAULT_BUS_CAPACITY;

/// Interval between operator status polls on a subscription
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// How many times the binder asks the operator for a broker endpoint
pub const DEFAULT_BROKER_WAIT_ATTEMPTS: u32 = 60;

/// Pause between broker endpoint lookups
pub const DEFAULT_BROKER_WAIT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    pub poll_interval: Duration,
    pub broker_wait_attempts: u32,
    pub broker_wait_interval: Duration,
    pub bus_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            broker_wait_attempts: DEFAULT_BROKER_WAIT_ATTEMPTS,
            broker_wait_interval: DEFAULT_BROKER_WAIT_INTERVAL,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.broker_wait_attempts, 60);
        assert_eq!(config.bus_capacity, DEFAULT_BUS_CAPACITY);
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"brokerWaitAttempts": 5}"#).unwrap();
        assert_eq!(config.broker_wait_attempts, 5);
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
    }
}
