use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct InFlightConfig {
    /// Period of the expired-entry sweep
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for InFlightConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl InFlightConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "in_flight.sweep_interval_ms must be > 0".to_string(),
            )));
        }
        Ok(())
    }
}

fn default_sweep_interval_ms() -> u64 {
    1000
}
