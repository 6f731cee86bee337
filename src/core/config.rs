use crate::core::errors::ConfigError;
use std::env;
use std::time::Duration;
use tracing::Level;

/// Remote service configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub client_version: String,
    pub face_detection_timeout: Duration,
    pub segmentation_timeout: Duration,
    pub generation_timeout: Duration,
    /// Retry budget carried over from the service contract. The core performs
    /// no automatic retries; a failed run is re-invoked by the caller.
    pub max_retries: u32,
}

/// Upload validation configuration
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,
}

/// Chat session configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub simulation_delay_min_ms: u64,
    pub simulation_delay_max_ms: u64,
}

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub upload: UploadConfig,
    pub chat: ChatConfig,
    pub log_level: Level,
}

impl Config {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        let config = Self::load_from_env();
        config.validate()?;
        Ok(config)
    }

    fn load_from_env() -> Self {
        let log_level = env::var("LOG_LEVEL")
            .ok()
            .and_then(|s| match s.to_lowercase().as_str() {
                "trace" => Some(Level::TRACE),
                "debug" => Some(Level::DEBUG),
                "info" => Some(Level::INFO),
                "warn" | "warning" => Some(Level::WARN),
                "error" => Some(Level::ERROR),
                _ => None,
            })
            .unwrap_or(Level::INFO);

        Self {
            api: ApiConfig {
                base_url: env::var("IDPHOTO_API_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3001".to_string()),
                api_key: env::var("IDPHOTO_API_KEY").unwrap_or_default(),
                client_version: env::var("IDPHOTO_CLIENT_VERSION")
                    .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
                face_detection_timeout: Duration::from_millis(
                    env::var("FACE_DETECTION_TIMEOUT_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(10_000),
                ),
                segmentation_timeout: Duration::from_millis(
                    env::var("SEGMENTATION_TIMEOUT_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(20_000),
                ),
                generation_timeout: Duration::from_millis(
                    env::var("GENERATION_TIMEOUT_MS")
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(30_000),
                ),
                max_retries: env::var("MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3),
            },
            upload: UploadConfig {
                max_file_size: env::var("MAX_UPLOAD_BYTES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10 * 1024 * 1024),
            },
            chat: ChatConfig {
                simulation_delay_min_ms: env::var("SIMULATION_DELAY_MIN_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1_500),
                simulation_delay_max_ms: env::var("SIMULATION_DELAY_MAX_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2_000),
            },
            log_level,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }

        if self.api.face_detection_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                name: "face detection",
            });
        }
        if self.api.segmentation_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout {
                name: "segmentation",
            });
        }
        if self.api.generation_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout { name: "generation" });
        }

        if self.upload.max_file_size == 0 {
            return Err(ConfigError::InvalidMaxFileSize);
        }

        if self.chat.simulation_delay_min_ms > self.chat.simulation_delay_max_ms {
            return Err(ConfigError::InvalidDelayWindow {
                min_ms: self.chat.simulation_delay_min_ms,
                max_ms: self.chat.simulation_delay_max_ms,
            });
        }

        Ok(())
    }
}

impl Default for Config {
    /// Defaults without touching the process environment; used by tests and
    /// embedders that configure programmatically.
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:3001".to_string(),
                api_key: String::new(),
                client_version: env!("CARGO_PKG_VERSION").to_string(),
                face_detection_timeout: Duration::from_secs(10),
                segmentation_timeout: Duration::from_secs(20),
                generation_timeout: Duration::from_secs(30),
                max_retries: 3,
            },
            upload: UploadConfig {
                max_file_size: 10 * 1024 * 1024,
            },
            chat: ChatConfig {
                simulation_delay_min_ms: 1_500,
                simulation_delay_max_ms: 2_000,
            },
            log_level: Level::INFO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.api.face_detection_timeout, Duration::from_secs(10));
        assert_eq!(config.api.segmentation_timeout, Duration::from_secs(20));
        assert_eq!(config.api.generation_timeout, Duration::from_secs(30));
        assert_eq!(config.upload.max_file_size, 10 * 1024 * 1024);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.api.segmentation_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeout {
                name: "segmentation"
            })
        ));
    }

    #[test]
    fn test_inverted_delay_window_rejected() {
        let mut config = Config::default();
        config.chat.simulation_delay_min_ms = 3_000;
        config.chat.simulation_delay_max_ms = 2_000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDelayWindow { .. })
        ));
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let mut config = Config::default();
        config.api.base_url = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyBaseUrl)));
    }
}
