use super::{ConfigResult, ConfigValidator, CoreConfig, StreamingSpeedConfig};

/// Builder for CoreConfig that wraps the config itself
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from an existing configuration (takes ownership)
    pub fn from_config(config: CoreConfig) -> Self {
        Self { config }
    }

    // ==================== Pipeline ====================

    pub fn default_stage_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.pipeline.default_timeout_ms = timeout_ms;
        self
    }

    pub fn stage_timeout_ms(mut self, stage: impl Into<String>, timeout_ms: u64) -> Self {
        self.config
            .pipeline
            .stage_timeouts_ms
            .insert(stage.into(), timeout_ms);
        self
    }

    // ==================== Streaming ====================

    pub fn streaming_speed(mut self, chars_per_batch: usize, delay_ms: u64) -> Self {
        self.config.streaming = StreamingSpeedConfig::new(chars_per_batch, delay_ms);
        self
    }

    // ==================== Logging ====================

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.log_level = level.into();
        self
    }

    pub fn log_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.log_dir = Some(dir.into());
        self
    }

    pub fn maybe_log_dir(mut self, dir: Option<impl Into<String>>) -> Self {
        self.config.log_dir = dir.map(|d| d.into());
        self
    }

    pub fn log_json(mut self, enable: bool) -> Self {
        self.config.log_json = enable;
        self
    }

    // ==================== Build ====================

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<CoreConfig> {
        ConfigValidator::validate(&self.config)?;
        Ok(self.config)
    }

    /// Build without validation
    pub fn build_unchecked(self) -> CoreConfig {
        self.config
    }
}
