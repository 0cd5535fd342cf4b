use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Subscriber push settings shared by the datagram and stream push centers
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PushConfig {
    /// A notifier not refreshed within this window is a zombie
    #[serde(default = "default_zombie_window_ms")]
    pub zombie_window_ms: u64,

    /// How often push centers reap zombie watch clients
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,

    /// Expiry of a stream push awaiting its acknowledgement
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Window of the long-poll watch served by the surrounding protocol layer.
    /// Must not be shorter than `ack_timeout_ms`.
    #[serde(default = "default_long_poll_timeout_ms")]
    pub long_poll_timeout_ms: u64,

    /// Serialized payloads above this size are gzip-compressed on the datagram path
    #[serde(default = "default_compress_threshold_bytes")]
    pub compress_threshold_bytes: usize,

    /// Outbound buffer of each attached client stream
    #[serde(default = "default_stream_buffer_size")]
    pub stream_buffer_size: usize,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            zombie_window_ms: default_zombie_window_ms(),
            reap_interval_ms: default_reap_interval_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            long_poll_timeout_ms: default_long_poll_timeout_ms(),
            compress_threshold_bytes: default_compress_threshold_bytes(),
            stream_buffer_size: default_stream_buffer_size(),
        }
    }
}

impl PushConfig {
    pub fn validate(&self) -> Result<()> {
        if self.zombie_window_ms == 0 || self.reap_interval_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "push.zombie_window_ms and push.reap_interval_ms must be > 0".to_string(),
            )));
        }

        if self.ack_timeout_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "push.ack_timeout_ms must be > 0".to_string(),
            )));
        }

        if self.long_poll_timeout_ms < self.ack_timeout_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "push.long_poll_timeout_ms {}ms must be >= ack_timeout_ms {}ms",
                self.long_poll_timeout_ms, self.ack_timeout_ms
            ))));
        }

        if self.stream_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "push.stream_buffer_size must be > 0".to_string(),
            )));
        }

        Ok(())
    }
}

fn default_zombie_window_ms() -> u64 {
    10_000
}
fn default_reap_interval_ms() -> u64 {
    5_000
}
fn default_ack_timeout_ms() -> u64 {
    5_000
}
fn default_long_poll_timeout_ms() -> u64 {
    30_000
}
fn default_compress_threshold_bytes() -> usize {
    crate::constants::COMPRESS_THRESHOLD_BYTES
}
fn default_stream_buffer_size() -> usize {
    128
}
