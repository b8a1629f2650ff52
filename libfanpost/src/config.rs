//! Configuration management for Fanpost

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/fanpost/fanpost.db".to_string(),
        }
    }
}

/// Dispatch tuning. Durations use humantime syntax ("5m", "20s").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// How far back a scheduled post is still considered due
    pub lookback: String,
    /// Upper bound on a single adapter call
    pub call_timeout: String,
    /// Dispatch attempts before a post with zero successes is dead-lettered
    pub max_attempts: u32,
    /// Age after which an abandoned `publishing` claim is released
    pub lease_ttl: String,
    /// Poll interval for the `fan-send` loop
    pub poll_interval: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            lookback: "5m".to_string(),
            call_timeout: "20s".to_string(),
            max_attempts: 3,
            lease_ttl: "10m".to_string(),
            poll_interval: "60s".to_string(),
        }
    }
}

/// Parsed, validated form of [`DispatchConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    pub lookback: Duration,
    pub call_timeout: Duration,
    pub max_attempts: u32,
    pub lease_ttl: Duration,
    pub poll_interval: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            lookback: Duration::from_secs(5 * 60),
            call_timeout: Duration::from_secs(20),
            max_attempts: 3,
            lease_ttl: Duration::from_secs(10 * 60),
            poll_interval: Duration::from_secs(60),
        }
    }
}

impl DispatchConfig {
    pub fn settings(&self) -> Result<DispatchSettings> {
        let settings = DispatchSettings {
            lookback: parse_duration_field("dispatch.lookback", &self.lookback)?,
            call_timeout: parse_duration_field("dispatch.call_timeout", &self.call_timeout)?,
            max_attempts: self.max_attempts,
            lease_ttl: parse_duration_field("dispatch.lease_ttl", &self.lease_ttl)?,
            poll_interval: parse_duration_field("dispatch.poll_interval", &self.poll_interval)?,
        };

        if settings.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dispatch.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if settings.call_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "dispatch.call_timeout".to_string(),
                reason: "must be greater than zero".to_string(),
            }
            .into());
        }
        // A claim must outlive the dispatch it guards
        if settings.lease_ttl <= settings.call_timeout {
            return Err(ConfigError::InvalidValue {
                field: "dispatch.lease_ttl".to_string(),
                reason: format!(
                    "must be longer than dispatch.call_timeout ({})",
                    self.call_timeout
                ),
            }
            .into());
        }

        Ok(settings)
    }
}

fn parse_duration_field(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value).map_err(|e| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not a duration: {}", value, e),
        }
        .into()
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Shared bearer secret for the trigger endpoint. `FANPOST_CRON_SECRET` wins.
    pub cron_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
            cron_secret: None,
        }
    }
}

/// Base URLs for each platform API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub twitter: String,
    pub linkedin: String,
    pub instagram: String,
    pub discord: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            twitter: "https://api.twitter.com/2".to_string(),
            linkedin: "https://api.linkedin.com/v2".to_string(),
            instagram: "https://graph.facebook.com/v18.0".to_string(),
            discord: "https://discord.com/api/v10".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every platform at one base URL (stub servers in tests)
    pub fn all_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            twitter: format!("{}/twitter", base),
            linkedin: format!("{}/linkedin", base),
            instagram: format!("{}/instagram", base),
            discord: format!("{}/discord", base),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error: defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default_config());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.dispatch.settings()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self::default()
    }

    /// Database path with `~` expanded
    pub fn database_path(&self) -> String {
        shellexpand::tilde(&self.database.path).to_string()
    }

    /// The trigger secret, preferring the environment over the file
    pub fn cron_secret(&self) -> Option<SecretString> {
        std::env::var("FANPOST_CRON_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .or_else(|| self.server.cron_secret.clone().filter(|s| !s.is_empty()))
            .map(SecretString::from)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FANPOST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("fanpost").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Config::default_config().dispatch.settings().unwrap();
        assert_eq!(settings, DispatchSettings::default());
        assert_eq!(settings.lookback, Duration::from_secs(300));
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[database]
path = "/tmp/fanpost-test.db"

[dispatch]
lookback = "10m"
max_attempts = 5
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.database.path, "/tmp/fanpost-test.db");
        let settings = config.dispatch.settings().unwrap();
        assert_eq!(settings.lookback, Duration::from_secs(600));
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.call_timeout, Duration::from_secs(20));
        assert_eq!(config.endpoints, Endpoints::default());
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[dispatch]\nlookback = \"soon\"\n").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("dispatch.lookback"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = DispatchConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(config.settings().is_err());
    }

    #[test]
    fn test_lease_must_outlive_call_timeout() {
        let config = DispatchConfig {
            lease_ttl: "1s".to_string(),
            call_timeout: "20s".to_string(),
            ..Default::default()
        };
        let err = config.settings().unwrap_err();
        assert!(err.to_string().contains("dispatch.lease_ttl"));

        let equal = DispatchConfig {
            lease_ttl: "20s".to_string(),
            ..Default::default()
        };
        assert!(equal.settings().is_err());
    }

    #[test]
    fn test_endpoints_all_at() {
        let endpoints = Endpoints::all_at("http://127.0.0.1:9999/");
        assert_eq!(endpoints.twitter, "http://127.0.0.1:9999/twitter");
        assert_eq!(endpoints.discord, "http://127.0.0.1:9999/discord");
    }

    #[test]
    #[serial]
    fn test_config_path_env_override() {
        std::env::set_var("FANPOST_CONFIG", "/tmp/custom-fanpost.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("FANPOST_CONFIG");
        assert_eq!(path, PathBuf::from("/tmp/custom-fanpost.toml"));
    }

    #[test]
    #[serial]
    fn test_cron_secret_env_wins() {
        let mut config = Config::default_config();
        config.server.cron_secret = Some("from-file".to_string());

        std::env::remove_var("FANPOST_CRON_SECRET");
        assert_eq!(config.cron_secret().unwrap().expose_secret(), "from-file");

        std::env::set_var("FANPOST_CRON_SECRET", "from-env");
        let secret = config.cron_secret();
        std::env::remove_var("FANPOST_CRON_SECRET");
        assert_eq!(secret.unwrap().expose_secret(), "from-env");
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");
        std::env::set_var("FANPOST_CONFIG", path.to_str().unwrap());
        let config = Config::load();
        std::env::remove_var("FANPOST_CONFIG");
        assert_eq!(config.unwrap().server.bind, "127.0.0.1:8080");
    }
}
