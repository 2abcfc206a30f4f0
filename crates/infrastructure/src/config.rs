use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Service configuration, loaded from the environment. `DATABASE_URL` and
/// `MQTT_BROKER_URL` are required; everything else has a default.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,
    pub database_url: String,
    pub mqtt_broker_url: String,
    pub mqtt_client_id: String,
    pub mqtt_qos: u8,
    pub shutdown_timeout_secs: u64,
    pub cors_allowed_origins: String,
    pub holidays_api_enabled: bool,
    pub holidays_country_code: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let cfg = Config::builder()
            .set_default("port", 8080)?
            .set_default("log_level", "info")?
            .set_default("mqtt_client_id", "production-line-api")?
            .set_default("mqtt_qos", 1)?
            .set_default("shutdown_timeout_secs", 10)?
            .set_default("cors_allowed_origins", "")?
            .set_default("holidays_api_enabled", true)?
            .set_default("holidays_country_code", "DE")?
            .add_source(Environment::default())
            .build()?;

        let cfg: AppConfig = cfg.try_deserialize()?;

        if !matches!(cfg.log_level.as_str(), "debug" | "info" | "warn" | "error") {
            return Err(ConfigError::Message(format!(
                "invalid log level: {} (must be debug, info, warn, or error)",
                cfg.log_level
            )));
        }

        if cfg.mqtt_qos > 2 {
            return Err(ConfigError::Message(format!(
                "invalid MQTT QoS: {} (must be 0, 1, or 2)",
                cfg.mqtt_qos
            )));
        }

        Ok(cfg)
    }

    /// Comma-separated allowed origins; `*` allows any.
    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
