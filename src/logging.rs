use std::{path::PathBuf, str::FromStr};

use tracing::Level;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_log::LogTracer;
use tracing_subscriber::{
    fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::config::CoreConfig;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the application (default: INFO)
    pub level: Level,
    /// Whether to use json format for logs (default: false)
    pub json_format: bool,
    /// Path to store log files. If None, logs only go to stderr
    pub log_dir: Option<String>,
    /// Whether to colorize console logs (default: true)
    pub colorize: bool,
    /// Log file name prefix used when log_dir is set
    pub log_file_name: String,
    /// Targets the level applies to (default: this crate)
    pub log_targets: Option<Vec<String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            log_dir: None,
            colorize: true,
            log_file_name: "chat-pipeline".to_string(),
            log_targets: Some(vec![
                "chat_pipeline_rs".to_string(),
                "chat_pipeline".to_string(),
            ]),
        }
    }
}

impl LoggingConfig {
    /// Logging settings from the top-level configuration
    ///
    /// An unparseable level falls back to INFO; [`crate::config::ConfigValidator`]
    /// rejects those before this point.
    pub fn from_core_config(config: &CoreConfig) -> Self {
        Self {
            level: Level::from_str(&config.log_level).unwrap_or(Level::INFO),
            json_format: config.log_json,
            log_dir: config.log_dir.clone(),
            ..Default::default()
        }
    }
}

/// Guard that keeps the file appender worker thread alive
///
/// This must be kept in scope for the duration of the program
/// to ensure logs are properly written to files
#[allow(dead_code)]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

fn level_filter(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// `<target>=<level>` directives joined with commas
fn filter_directives(config: &LoggingConfig) -> String {
    let level = level_filter(config.level);
    match &config.log_targets {
        Some(targets) if !targets.is_empty() => targets
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect::<Vec<_>>()
            .join(","),
        _ => format!("chat_pipeline_rs={}", level),
    }
}

/// Initialize the logging system with the given configuration
///
/// Console output goes to stderr so stdout stays reserved for streamed
/// response bytes. Returns a guard that must be kept alive for the duration
/// of the program.
pub fn init_logging(config: LoggingConfig) -> LogGuard {
    // Forward `log` records to tracing; ignore errors to allow re-initialization
    let _ = LogTracer::init();

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(&config)));

    let mut layers = Vec::new();

    // Standard timestamp format: YYYY-MM-DD HH:MM:SS
    let time_format = "%Y-%m-%d %H:%M:%S".to_string();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.colorize)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::new(time_format.clone()))
        .with_writer(std::io::stderr);

    let console_layer = if config.json_format {
        console_layer.json().flatten_event(true).boxed()
    } else {
        console_layer.boxed()
    };

    layers.push(console_layer);

    let mut file_guard = None;

    if let Some(log_dir) = &config.log_dir {
        let log_dir = PathBuf::from(log_dir);

        if !log_dir.exists() {
            if let Err(e) = std::fs::create_dir_all(&log_dir) {
                eprintln!("Failed to create log directory: {}", e);
                return LogGuard { _file_guard: None };
            }
        }

        let file_appender =
            RollingFileAppender::new(Rotation::DAILY, log_dir, config.log_file_name.clone());

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        file_guard = Some(guard);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_timer(ChronoUtc::new(time_format))
            .with_writer(non_blocking);

        let file_layer = if config.json_format {
            file_layer.json().flatten_event(true).boxed()
        } else {
            file_layer.boxed()
        };

        layers.push(file_layer);
    }

    // try_init: another subscriber may already be installed (tests)
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init();

    LogGuard {
        _file_guard: file_guard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfigBuilder;

    #[test]
    fn test_filter_directives() {
        let config = LoggingConfig {
            level: Level::DEBUG,
            log_targets: Some(vec!["a".to_string(), "b".to_string()]),
            ..Default::default()
        };
        assert_eq!(filter_directives(&config), "a=debug,b=debug");

        let config = LoggingConfig {
            log_targets: None,
            ..Default::default()
        };
        assert_eq!(filter_directives(&config), "chat_pipeline_rs=info");
    }

    #[test]
    fn test_from_core_config() {
        let core = CoreConfigBuilder::new()
            .log_level("warn")
            .log_json(true)
            .log_dir("/var/log/chat")
            .build_unchecked();
        let config = LoggingConfig::from_core_config(&core);
        assert_eq!(config.level, Level::WARN);
        assert!(config.json_format);
        assert_eq!(config.log_dir.as_deref(), Some("/var/log/chat"));
    }

    #[test]
    fn test_init_logging_writes_to_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        let _guard = init_logging(LoggingConfig {
            log_dir: Some(nested.display().to_string()),
            ..Default::default()
        });
        assert!(nested.exists());
    }
}
