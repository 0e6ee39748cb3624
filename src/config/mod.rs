use once_cell::sync::Lazy;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub governor: GovernorConfig,
    pub assistant: AssistantConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug)]
pub struct SecurityConfig {
    pub jwt_secret: Option<SecretString>,
    pub jwt_expiry_hours: u64,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
}

/// Limits enforced by the usage governor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernorConfig {
    pub per_minute_limit: usize,
    pub throttling_threshold_percent: f64,
    /// Fractional seconds are allowed.
    pub throttling_delay_seconds: f64,
    pub monthly_budget: u64,
}

#[derive(Debug)]
pub struct AssistantConfig {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub thinking_mode: bool,
}

#[derive(Debug)]
pub struct StorageConfig {
    pub url: Option<String>,
    pub key: Option<SecretString>,
    pub context_bucket: String,
    pub text_suffix: String,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            per_minute_limit: 60,
            throttling_threshold_percent: 80.0,
            throttling_delay_seconds: 2.0,
            monthly_budget: 1500,
        }
    }
}

impl GovernorConfig {
    /// Negative or non-finite values mean no delay.
    pub fn throttling_delay(&self) -> Duration {
        valid_delay(self.throttling_delay_seconds)
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::ZERO)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        self.server.port = parsed_env("PORT", self.server.port);
        if let Ok(v) = env::var("LOG_LEVEL") {
            self.server.log_level = v.to_lowercase();
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = non_empty(v);
        }
        self.database.max_connections = parsed_env("DATABASE_MAX_CONNECTIONS", self.database.max_connections);
        self.database.connection_timeout = parsed_env("DATABASE_CONNECTION_TIMEOUT", self.database.connection_timeout);

        // Security overrides
        if let Some(v) = first_env(&["JWT_SECRET", "SECRET_KEY"]) {
            self.security.jwt_secret = Some(SecretString::from(v));
        }
        self.security.jwt_expiry_hours = parsed_env("JWT_EXPIRY_HOURS", self.security.jwt_expiry_hours);
        self.security.bcrypt_cost = parsed_env("BCRYPT_ROUNDS", self.security.bcrypt_cost);
        if let Ok(v) = env::var("CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Governor overrides
        self.governor.per_minute_limit = parsed_env("GOVERNOR_PER_MINUTE_LIMIT", self.governor.per_minute_limit);
        self.governor.throttling_threshold_percent = parsed_env(
            "GOVERNOR_THROTTLING_THRESHOLD_PERCENT",
            self.governor.throttling_threshold_percent,
        );
        self.governor.throttling_delay_seconds = env::var("GOVERNOR_THROTTLING_DELAY_SECONDS")
            .ok()
            .and_then(|raw| parse_delay_seconds("GOVERNOR_THROTTLING_DELAY_SECONDS", &raw))
            .unwrap_or(self.governor.throttling_delay_seconds);
        self.governor.monthly_budget = parsed_env("GOVERNOR_MONTHLY_BUDGET", self.governor.monthly_budget);

        // Assistant overrides
        if let Some(v) = first_env(&["GOOGLE_API_KEY", "GEMINI_API_KEY"]) {
            self.assistant.api_key = Some(SecretString::from(v));
        }
        if let Ok(v) = env::var("GEMINI_MODEL") {
            self.assistant.model = v;
        }
        if let Ok(v) = env::var("GEMINI_BASE_URL") {
            self.assistant.base_url = v.trim_end_matches('/').to_string();
        }
        self.assistant.timeout_secs = parsed_env("GEMINI_TIMEOUT_SECS", self.assistant.timeout_secs);
        self.assistant.thinking_mode = parsed_env("GEMINI_THINKING_MODE", self.assistant.thinking_mode);

        // Storage overrides
        if let Some(v) = first_env(&["STORAGE_URL", "SUPABASE_URL"]) {
            self.storage.url = Some(v.trim_end_matches('/').to_string());
        }
        if let Some(v) = first_env(&["STORAGE_KEY", "SUPABASE_SECRET_KEY", "SUPABASE_ANON_KEY"]) {
            self.storage.key = Some(SecretString::from(v));
        }
        if let Ok(v) = env::var("STORAGE_CONTEXT_BUCKET") {
            self.storage.context_bucket = v;
        }
        if let Ok(v) = env::var("CONTEXT_TEXT_SUFFIX") {
            self.storage.text_suffix = v;
        }

        self
    }

    /// Names of the required settings that are missing.
    pub fn validate(&self) -> Result<(), Vec<&'static str>> {
        let mut missing = Vec::new();
        if self.database.url.is_none() {
            missing.push("DATABASE_URL");
        }
        if self.security.jwt_secret.is_none() {
            missing.push("JWT_SECRET");
        }
        if self.assistant.api_key.is_none() {
            missing.push("GOOGLE_API_KEY");
        }
        if self.storage.url.is_none() {
            missing.push("STORAGE_URL");
        }
        if self.storage.key.is_none() {
            missing.push("STORAGE_KEY");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                log_level: "debug".to_string(),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: None,
                jwt_expiry_hours: 24,
                bcrypt_cost: 12,
                cors_origins: vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ],
            },
            governor: GovernorConfig::default(),
            assistant: AssistantConfig {
                api_key: None,
                model: "gemini-2.5-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                timeout_secs: 60,
                thinking_mode: true,
            },
            storage: StorageConfig {
                url: None,
                key: None,
                context_bucket: "context-files".to_string(),
                text_suffix: ".txt".to_string(),
            },
        }
    }

    pub fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.server.log_level = "info".to_string();
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.security.cors_origins = Vec::new();
        config
    }

    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.server.log_level = "info".to_string();
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.security.cors_origins = Vec::new();
        config
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Value of `key` parsed as `T`, or `current` when unset or unparseable.
fn parsed_env<T: FromStr>(key: &str, current: T) -> T {
    match env::var(key) {
        Ok(raw) => parse_or_warn(key, &raw).unwrap_or(current),
        Err(_) => current,
    }
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw, "Ignoring unparseable setting");
            None
        }
    }
}

fn valid_delay(seconds: f64) -> Option<f64> {
    (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
}

fn parse_delay_seconds(key: &str, raw: &str) -> Option<f64> {
    let seconds = parse_or_warn::<f64>(key, raw)?;
    let valid = valid_delay(seconds);
    if valid.is_none() {
        warn!(key, value = raw, "Ignoring negative or non-finite delay");
    }
    valid
}

/// First non-empty value among `keys`, in order.
fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find_map(non_empty)
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<Arc<AppConfig>> = Lazy::new(|| Arc::new(AppConfig::from_env()));

// Convenience function for accessing config
pub fn config() -> Arc<AppConfig> {
    Arc::clone(&CONFIG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.security.jwt_expiry_hours, 24);
        assert_eq!(config.assistant.model, "gemini-2.5-flash");
        assert_eq!(config.storage.context_bucket, "context-files");
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.server.log_level, "info");
        assert!(config.security.cors_origins.is_empty());
    }

    #[test]
    fn test_governor_defaults() {
        let governor = GovernorConfig::default();
        assert_eq!(governor.per_minute_limit, 60);
        assert_eq!(governor.throttling_threshold_percent, 80.0);
        assert_eq!(governor.throttling_delay(), Duration::from_secs(2));
        assert_eq!(governor.monthly_budget, 1500);
    }

    #[test]
    fn test_fractional_throttling_delay() {
        let governor = GovernorConfig {
            throttling_delay_seconds: 0.5,
            ..GovernorConfig::default()
        };
        assert_eq!(governor.throttling_delay(), Duration::from_millis(500));

        let broken = GovernorConfig {
            throttling_delay_seconds: f64::NAN,
            ..GovernorConfig::default()
        };
        assert_eq!(broken.throttling_delay(), Duration::ZERO);
    }

    #[test]
    fn test_parse_delay_seconds_rejects_bad_values() {
        let key = "GOVERNOR_THROTTLING_DELAY_SECONDS";
        assert_eq!(parse_delay_seconds(key, "0.5"), Some(0.5));
        assert_eq!(parse_delay_seconds(key, " 3 "), Some(3.0));
        assert_eq!(parse_delay_seconds(key, "-1"), None);
        assert_eq!(parse_delay_seconds(key, "inf"), None);
        assert_eq!(parse_delay_seconds(key, "NaN"), None);
        assert_eq!(parse_delay_seconds(key, "two"), None);
    }

    #[test]
    fn test_env_override_accepts_fractional_delay() {
        env::set_var("GOVERNOR_THROTTLING_DELAY_SECONDS", "0.5");
        let config = AppConfig::development().with_env_overrides();
        env::remove_var("GOVERNOR_THROTTLING_DELAY_SECONDS");
        assert_eq!(config.governor.throttling_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_validate_reports_every_missing_setting() {
        let missing = AppConfig::development().validate().unwrap_err();
        assert_eq!(
            missing,
            vec!["DATABASE_URL", "JWT_SECRET", "GOOGLE_API_KEY", "STORAGE_URL", "STORAGE_KEY"]
        );
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let mut config = AppConfig::development();
        config.database.url = Some("postgres://localhost/apbia".to_string());
        config.security.jwt_secret = Some(SecretString::from("secret"));
        config.assistant.api_key = Some(SecretString::from("key"));
        config.storage.url = Some("http://localhost:54321".to_string());
        config.storage.key = Some(SecretString::from("service"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_empty_trims() {
        assert_eq!(non_empty("  ".to_string()), None);
        assert_eq!(non_empty(" x ".to_string()), Some("x".to_string()));
    }
}
