use std::{collections::HashMap, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigResult, ConfigValidator};

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub streaming: StreamingSpeedConfig,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            streaming: StreamingSpeedConfig::default(),
            log_level: default_log_level(),
            log_dir: None,
            log_json: false,
        }
    }
}

impl CoreConfig {
    /// Load and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: CoreConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }
}

/// Stage timeout configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Timeout for stages without an explicit entry
    #[serde(default = "default_stage_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Per-stage timeouts keyed by stage name
    #[serde(default)]
    pub stage_timeouts_ms: HashMap<String, u64>,
}

fn default_stage_timeout_ms() -> u64 {
    30_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_stage_timeout_ms(),
            stage_timeouts_ms: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn timeouts(&self) -> HashMap<String, Duration> {
        self.stage_timeouts_ms
            .iter()
            .map(|(name, ms)| (name.clone(), Duration::from_millis(*ms)))
            .collect()
    }
}

/// Pacing of streamed output: `chars_per_batch` characters every `delay_ms`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamingSpeedConfig {
    #[serde(default = "default_chars_per_batch")]
    pub chars_per_batch: usize,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_chars_per_batch() -> usize {
    5
}

fn default_delay_ms() -> u64 {
    8
}

impl Default for StreamingSpeedConfig {
    fn default() -> Self {
        Self {
            chars_per_batch: default_chars_per_batch(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl StreamingSpeedConfig {
    pub fn new(chars_per_batch: usize, delay_ms: u64) -> Self {
        Self {
            chars_per_batch,
            delay_ms,
        }
    }

    /// Interval between batches, never shorter than 1ms
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.max(1))
    }

    /// Characters per batch, never fewer than 1
    pub fn batch_size(&self) -> usize {
        self.chars_per_batch.max(1)
    }
}
