use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Materialized view refresh settings
///
/// ```toml
/// [sync]
/// refresh_interval_ms = 1000
/// cache_millis = 10000
/// ```
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SyncConfig {
    /// Period of the background refresh task
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    /// `cacheMillis` advertised to clients in rendered service data
    #[serde(default = "default_cache_millis")]
    pub cache_millis: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            cache_millis: default_cache_millis(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "sync.refresh_interval_ms must be > 0".to_string(),
            )));
        }
        Ok(())
    }
}

fn default_refresh_interval_ms() -> u64 {
    1000
}
fn default_cache_millis() -> u64 {
    10_000
}
