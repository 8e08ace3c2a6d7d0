//! Application configuration types

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shopdesk_common::auth::types::{DEFAULT_AUTHORIZE_PATH, DEFAULT_TOKEN_PATH};
use shopdesk_common::auth::OAuthConfig;
use url::Url;

use super::error::ConfigError;

pub const DEFAULT_AUTHORIZATION_SERVER: &str = "http://localhost:9000";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:4200/callback";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "ShopDesk.session";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Top-level configuration for the dashboard client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub auth: AuthSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Authorization server and client registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_authorization_server")]
    pub authorization_server: String,
    #[serde(default = "default_authorize_path")]
    pub authorize_path: String,
    #[serde(default = "default_token_path")]
    pub token_path: String,
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Resource server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self { base_url: default_api_base_url(), timeout_secs: DEFAULT_TIMEOUT_SECS }
    }
}

impl ApiSettings {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where the session is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keychain,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keychain" => Ok(Self::Keychain),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::invalid(
                "storage.backend",
                format!("expected file, keychain or memory, got '{other}'"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Session file for the `file` backend; defaults under `$HOME/.shopdesk`
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            keychain_service: default_keychain_service(),
        }
    }
}

impl StorageSettings {
    /// Resolved session file path
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map_or_else(|| PathBuf::from("."), PathBuf::from)
                .join(".shopdesk")
                .join("session.json")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: default_log_level(), json: false }
    }
}

impl AuthSettings {
    /// Settings with defaults for everything but the client id
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            authorization_server: default_authorization_server(),
            authorize_path: default_authorize_path(),
            token_path: default_token_path(),
            client_id: client_id.into(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    /// Configuration with defaults for everything but the client id
    pub fn with_client_id(client_id: impl Into<String>) -> Self {
        Self {
            auth: AuthSettings::new(client_id),
            api: ApiSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }

    /// OAuth settings in the form the session manager takes
    #[must_use]
    pub fn oauth_config(&self) -> OAuthConfig {
        OAuthConfig::new(
            self.auth.authorization_server.clone(),
            self.auth.client_id.clone(),
            self.auth.redirect_uri.clone(),
            self.auth.scopes.clone(),
        )
        .with_paths(self.auth.authorize_path.clone(), self.auth.token_path.clone())
        .with_request_timeout(Duration::from_secs(self.auth.request_timeout_secs))
    }

    /// Check that the configuration can drive the flow
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.oauth_config()
            .validate()
            .map_err(|e| ConfigError::invalid("auth", e.to_string()))?;
        Url::parse(&self.api.base_url)
            .map_err(|e| ConfigError::invalid("api.base_url", e.to_string()))?;
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::invalid("api.timeout_secs", "must be positive"));
        }
        Ok(())
    }
}

fn default_authorization_server() -> String {
    DEFAULT_AUTHORIZATION_SERVER.to_string()
}

fn default_authorize_path() -> String {
    DEFAULT_AUTHORIZE_PATH.to_string()
}

fn default_token_path() -> String {
    DEFAULT_TOKEN_PATH.to_string()
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string(), "profile".to_string()]
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_keychain_service() -> String {
    DEFAULT_KEYCHAIN_SERVICE.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_config_carries_every_setting() {
        let mut config = AppConfig::with_client_id("dashboard");
        config.auth.token_path = "/token".to_string();
        config.auth.request_timeout_secs = 5;

        let oauth = config.oauth_config();
        assert_eq!(oauth.client_id, "dashboard");
        assert_eq!(oauth.token_url(), "http://localhost:9000/token");
        assert_eq!(oauth.authorization_url(), "http://localhost:9000/oauth2/authorize");
        assert_eq!(oauth.request_timeout, Duration::from_secs(5));
        assert_eq!(oauth.scope_string(), "openid profile");
    }

    #[test]
    fn test_validate_rejects_empty_client_id_and_zero_timeout() {
        assert!(AppConfig::with_client_id("dashboard").validate().is_ok());
        assert!(AppConfig::with_client_id(" ").validate().is_err());

        let mut config = AppConfig::with_client_id("dashboard");
        config.api.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "api.timeout_secs"
        ));
    }

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("Keychain".parse::<StorageBackend>().ok(), Some(StorageBackend::Keychain));
        assert_eq!("memory".parse::<StorageBackend>().ok(), Some(StorageBackend::Memory));
        assert!("sqlite".parse::<StorageBackend>().is_err());
    }
}
