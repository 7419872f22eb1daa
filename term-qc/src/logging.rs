//! Logging configuration for term-qc.
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the application. [`setup::init_logging`] is a ready-made one.

use tracing::Level;

/// Controls how chatty the pipeline is.
///
/// The pipeline does not read it directly. It becomes a subscriber filter
/// through [`setup::LoggingConfig::from_log_config`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for term-qc components
    pub base_level: Level,
    /// Log every check invocation, not only faults
    pub log_check_details: bool,
    /// Log dataset loads and cache releases
    pub log_data_operations: bool,
    /// Maximum length of logged field values
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_check_details: false,
            log_data_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_check_details: true,
            log_data_operations: true,
            max_field_length: 1024,
        }
    }

    /// Warnings and above, nothing per check.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_check_details: false,
            log_data_operations: false,
            max_field_length: 128,
        }
    }

    /// The `EnvFilter` directive equivalent to this configuration.
    pub fn directive(&self) -> String {
        let data_level = if self.log_data_operations {
            self.base_level.max(Level::DEBUG)
        } else {
            self.base_level
        };
        let check_level = if self.log_check_details {
            Level::DEBUG
        } else {
            self.base_level
        };
        format!(
            "term_qc={},term_qc::core::cache={},term_qc::core::orchestrator={}",
            lower(self.base_level),
            lower(data_level),
            lower(check_level)
        )
    }
}

fn lower(level: Level) -> String {
    level.as_str().to_lowercase()
}

/// Truncates a value to `max_length` bytes, respecting char boundaries.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Subscriber setup for applications embedding term-qc.
pub mod setup {
    use tracing::Level;

    /// Configuration for [`init_logging`].
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for everything but term-qc
        pub level: Level,
        /// Log level for term-qc components
        pub qc_level: Level,
        pub json_format: bool,
        /// Overrides the computed filter
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                qc_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// JSON lines, warnings from dependencies, info from term-qc.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                qc_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                qc_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Logs term-qc as `config` describes, dependencies at `WARN`.
        pub fn from_log_config(config: &super::LogConfig) -> Self {
            Self {
                level: Level::WARN,
                qc_level: config.base_level,
                json_format: false,
                env_filter: Some(format!("warn,{}", config.directive())),
            }
        }

        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        pub fn with_qc_level(mut self, level: Level) -> Self {
            self.qc_level = level;
            self
        }

        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            match &self.env_filter {
                Some(filter) => filter.clone(),
                None => format!(
                    "{},term_qc={}",
                    self.level.as_str().to_lowercase(),
                    self.qc_level.as_str().to_lowercase()
                ),
            }
        }
    }

    /// Installs a global `tracing` subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter. Fails if a
    /// global subscriber is already set.
    ///
    /// ```rust,no_run
    /// use term_qc::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_presets() {
        let config = LogConfig::default();
        assert_eq!(config.base_level, Level::INFO);
        assert!(!config.log_check_details);
        assert!(config.log_data_operations);

        let verbose = LogConfig::verbose();
        assert_eq!(verbose.base_level, Level::DEBUG);
        assert!(verbose.log_check_details);

        let production = LogConfig::production();
        assert_eq!(production.base_level, Level::WARN);
        assert_eq!(production.max_field_length, 128);
    }

    #[test]
    fn test_directive() {
        assert_eq!(
            LogConfig::default().directive(),
            "term_qc=info,term_qc::core::cache=debug,term_qc::core::orchestrator=info"
        );
        assert_eq!(
            LogConfig::production().directive(),
            "term_qc=warn,term_qc::core::cache=warn,term_qc::core::orchestrator=warn"
        );
    }

    #[test]
    fn test_env_filter() {
        assert_eq!(LoggingConfig::default().env_filter(), "info,term_qc=debug");
        assert_eq!(
            LoggingConfig::production().env_filter(),
            "warn,term_qc=info"
        );
        assert_eq!(
            LoggingConfig::default().with_env_filter("off").env_filter(),
            "off"
        );
        assert!(LoggingConfig::from_log_config(&LogConfig::verbose())
            .env_filter()
            .starts_with("warn,term_qc=debug,"));
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text that should be truncated", 10),
            "this is a ...(truncated)"
        );
        assert_eq!(truncate_field("ééé", 3), "é...(truncated)");
    }
}
