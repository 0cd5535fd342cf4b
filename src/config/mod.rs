//! Configuration management for the change-propagation core.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`NACOS_COMPAT__` prefix, `__` separator)
//! - Component-wise validation
mod connection;
mod in_flight;
mod push;
mod sync;
pub use connection::*;
pub use in_flight::*;
pub use push::*;
pub use sync::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

const ENV_PREFIX: &str = "NACOS_COMPAT";

/// Main configuration container for the core components
///
/// Sources are merged in order (later overrides earlier):
/// 1. Default values from code
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct CompatConfig {
    /// Materialized view refresh
    #[serde(default)]
    pub sync: SyncConfig,
    /// Subscriber push delivery
    #[serde(default)]
    pub push: PushConfig,
    /// Streaming connection liveness
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Request/acknowledgement correlation
    #[serde(default)]
    pub in_flight: InFlightConfig,
}

impl Debug for CompatConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CompatConfig")
            .field("sync", &self.sync)
            .field("push", &self.push)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl CompatConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/compat.toml");
    /// std::env::set_var("NACOS_COMPAT__SYNC__REFRESH_INTERVAL_MS", "2000");
    /// let cfg = CompatConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file, then the latest environment.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every subsystem and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.sync.validate()?;
        self.push.validate()?;
        self.connection.validate()?;
        self.in_flight.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
