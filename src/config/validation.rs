use super::*;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &CoreConfig) -> ConfigResult<()> {
        Self::validate_pipeline(&config.pipeline)?;
        Self::validate_streaming(&config.streaming)?;
        Self::validate_logging(config)?;
        Ok(())
    }

    fn validate_pipeline(pipeline: &PipelineConfig) -> ConfigResult<()> {
        if pipeline.default_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.default_timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }

        for (name, timeout_ms) in &pipeline.stage_timeouts_ms {
            if name.trim().is_empty() {
                return Err(ConfigError::MissingRequired {
                    field: "pipeline.stage_timeouts_ms key".to_string(),
                });
            }
            if *timeout_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("pipeline.stage_timeouts_ms.{}", name),
                    value: "0".to_string(),
                    reason: "Must be > 0".to_string(),
                });
            }
        }

        Ok(())
    }

    fn validate_streaming(streaming: &StreamingSpeedConfig) -> ConfigResult<()> {
        if streaming.chars_per_batch == 0 {
            return Err(ConfigError::InvalidValue {
                field: "streaming.chars_per_batch".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }
        if streaming.delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "streaming.delay_ms".to_string(),
                value: "0".to_string(),
                reason: "Must be > 0".to_string(),
            });
        }
        Ok(())
    }

    fn validate_logging(config: &CoreConfig) -> ConfigResult<()> {
        if !LOG_LEVELS.contains(&config.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "log_level".to_string(),
                value: config.log_level.clone(),
                reason: format!("Must be one of: {}", LOG_LEVELS.join(", ")),
            });
        }
        if matches!(&config.log_dir, Some(dir) if dir.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed {
                reason: "log_dir must not be empty when set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(ConfigValidator::validate(&CoreConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_default_timeout() {
        let mut config = CoreConfig::default();
        config.pipeline.default_timeout_ms = 0;

        let result = ConfigValidator::validate(&config);
        assert!(result.is_err());
        if let Err(ConfigError::InvalidValue { field, .. }) = result {
            assert_eq!(field, "pipeline.default_timeout_ms");
        } else {
            panic!("Expected InvalidValue error");
        }
    }

    #[test]
    fn test_validate_stage_timeouts() {
        let mut config = CoreConfig::default();
        config
            .pipeline
            .stage_timeouts_ms
            .insert("Transcription".to_string(), 0);
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigError::InvalidValue { field, .. }) if field == "pipeline.stage_timeouts_ms.Transcription"
        ));

        let mut config = CoreConfig::default();
        config.pipeline.stage_timeouts_ms.insert(" ".to_string(), 100);
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_validate_streaming_speed() {
        let mut config = CoreConfig::default();
        config.streaming.delay_ms = 0;
        assert!(ConfigValidator::validate(&config).is_err());

        let mut config = CoreConfig::default();
        config.streaming.chars_per_batch = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_validate_log_settings() {
        let mut config = CoreConfig::default();
        config.log_level = "WARN".to_string();
        assert!(ConfigValidator::validate(&config).is_ok());

        config.log_level = "verbose".to_string();
        assert!(ConfigValidator::validate(&config).is_err());

        let mut config = CoreConfig::default();
        config.log_dir = Some(String::new());
        assert!(matches!(
            ConfigValidator::validate(&config),
            Err(ConfigError::ValidationFailed { .. })
        ));
    }
}
