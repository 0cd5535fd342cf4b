use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Liveness settings for streaming connections
///
/// A connection idle for longer than `keep_alive_multiplier * heartbeat_interval_ms`
/// is probed; all probes of one sweep share `probe_timeout_ms`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConnectionConfig {
    /// Nominal client heartbeat interval
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_keep_alive_multiplier")]
    pub keep_alive_multiplier: u32,

    /// Period of the liveness sweep
    #[serde(default = "default_check_interval_ms")]
    pub check_interval_ms: u64,

    /// Shared deadline for all detection requests of one sweep
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Capacity of the connect/disconnect event topic
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            keep_alive_multiplier: default_keep_alive_multiplier(),
            check_interval_ms: default_check_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl ConnectionConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms * self.keep_alive_multiplier as u64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms == 0 || self.keep_alive_multiplier == 0 {
            return Err(Error::Config(ConfigError::Message(
                "connection heartbeat interval and keep-alive multiplier must be > 0".to_string(),
            )));
        }

        if self.check_interval_ms == 0 || self.probe_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "connection.check_interval_ms and connection.probe_timeout_ms must be > 0"
                    .to_string(),
            )));
        }

        if self.event_capacity == 0 {
            return Err(Error::Config(ConfigError::Message(
                "connection.event_capacity must be > 0".to_string(),
            )));
        }

        Ok(())
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    5_000
}
fn default_keep_alive_multiplier() -> u32 {
    4
}
fn default_check_interval_ms() -> u64 {
    3_000
}
fn default_probe_timeout_ms() -> u64 {
    5_000
}
fn default_event_capacity() -> usize {
    1024
}
