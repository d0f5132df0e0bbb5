use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub listen_addr: String,
    #[serde(default)]
    pub telemetry_enabled: bool,
    #[serde(default = "default_telemetry_service_name")]
    pub telemetry_service_name: String,
    #[serde(default = "default_telemetry_service_version")]
    pub telemetry_service_version: String,
    #[serde(default = "default_telemetry_environment")]
    pub telemetry_environment: String,
    #[serde(default = "default_telemetry_otlp_endpoint")]
    pub telemetry_otlp_endpoint: String,
}

fn default_telemetry_service_name() -> String {
    "notice-board".to_string()
}

fn default_telemetry_service_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_telemetry_environment() -> String {
    "production".to_string()
}

fn default_telemetry_otlp_endpoint() -> String {
    "http://localhost:4317".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::build(Config::builder().add_source(Environment::default()))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder
            .set_default("database_max_connections", 5)?
            .set_default("listen_addr", "0.0.0.0:8080")?
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let builder = Config::builder()
            .set_override("database_url", "postgres://localhost/notices")
            .unwrap()
            .set_override("jwt_secret", "secret")
            .unwrap();

        let config = AppConfig::build(builder).unwrap();

        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert!(!config.telemetry_enabled);
        assert_eq!(config.telemetry_service_name, "notice-board");
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let builder = Config::builder()
            .set_override("database_url", "postgres://localhost/notices")
            .unwrap();

        assert!(AppConfig::build(builder).is_err());
    }
}
