//! Static configuration supplied by the surrounding system.
//!
//! Every struct has working defaults. With the `serde` feature enabled the whole tree can be
//! loaded from JSON, with missing fields falling back to their defaults.

use crate::models::MRT_HEADER_LEN;
use crate::queue::PacingMode;
use crate::session::LabelAction;
use std::time::Duration;
use thiserror::Error;

/// Largest accepted record body: a 4096 byte BGP message plus the 12 byte MRT header.
pub const DEFAULT_MAX_RECORD_LENGTH: u32 = 4096 + MRT_HEADER_LEN as u32;
/// Smallest accepted record body: a 19 byte BGP header plus a 16 byte BGP4MP header.
pub const DEFAULT_MIN_RECORD_LENGTH: u32 = 19 + 16;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "serde")]
    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level ingest configuration.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct IngestConfig {
    pub limits: DecoderLimits,
    pub pacing: PacingConfig,
    pub table_dump: TableDumpConfig,
    pub queue: QueueConfig,
    pub label_action: LabelAction,
}

impl IngestConfig {
    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: IngestConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate()?;
        self.pacing.validate()?;
        if self.queue.capacity == 0 {
            return Err(ConfigError::Invalid("queue capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Record length bounds enforced by the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct DecoderLimits {
    pub max_record_length: u32,
    pub min_record_length: u32,
}

impl Default for DecoderLimits {
    fn default() -> Self {
        DecoderLimits {
            max_record_length: DEFAULT_MAX_RECORD_LENGTH,
            min_record_length: DEFAULT_MIN_RECORD_LENGTH,
        }
    }
}

impl DecoderLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_record_length > self.max_record_length {
            return Err(ConfigError::Invalid(format!(
                "min_record_length {} exceeds max_record_length {}",
                self.min_record_length, self.max_record_length
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PacingConfig {
    /// Occupancy fraction at which pacing turns on.
    pub on_threshold: f64,
    /// Occupancy fraction below which readers turn pacing off.
    pub off_threshold: f64,
    /// EWMA weight of the newest sample.
    pub alpha: f64,
    pub min_writes_per_interval: u64,
    pub interval_ms: u64,
    pub mode: PacingMode,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            on_threshold: 0.8,
            off_threshold: 0.6,
            alpha: 0.5,
            min_writes_per_interval: 10,
            interval_ms: 10_000,
            mode: PacingMode::PerWriter,
        }
    }
}

impl PacingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(ConfigError::Invalid(format!(
                "alpha {} outside [0, 1]",
                self.alpha
            )));
        }
        if self.off_threshold > self.on_threshold {
            return Err(ConfigError::Invalid(format!(
                "off_threshold {} above on_threshold {}",
                self.off_threshold, self.on_threshold
            )));
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid("pacing interval must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig { capacity: 100_000 }
    }
}

/// Session lookup constants and draining budget of table-dump conversations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct TableDumpConfig {
    /// Local AS used when binding table-dump peers to sessions.
    pub local_asn: u32,
    pub bgp_port: u16,
    pub drain_poll_interval_ms: u64,
    pub drain_poll_attempts: u32,
}

impl Default for TableDumpConfig {
    fn default() -> Self {
        TableDumpConfig {
            local_asn: 6447,
            bgp_port: 179,
            drain_poll_interval_ms: 30_000,
            drain_poll_attempts: 6,
        }
    }
}

impl TableDumpConfig {
    pub fn drain_poll_interval(&self) -> Duration {
        Duration::from_millis(self.drain_poll_interval_ms)
    }
}
