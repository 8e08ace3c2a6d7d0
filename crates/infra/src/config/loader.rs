//! Configuration loader
//!
//! Loads [`AppConfig`] from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `SHOPDESK_CLIENT_ID` is absent, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Only `SHOPDESK_CLIENT_ID` is required; every other value has a default.
//! - `SHOPDESK_AUTH_SERVER`: Authorization server base URL
//! - `SHOPDESK_AUTHORIZE_PATH` / `SHOPDESK_TOKEN_PATH`: Endpoint paths
//! - `SHOPDESK_REDIRECT_URI`: Registered redirect URI
//! - `SHOPDESK_SCOPES`: Space- or comma-separated scopes
//! - `SHOPDESK_REQUEST_TIMEOUT`: Token endpoint timeout in seconds
//! - `SHOPDESK_API_BASE_URL` / `SHOPDESK_API_TIMEOUT`: Resource server
//! - `SHOPDESK_STORAGE`: `file`, `keychain` or `memory`
//! - `SHOPDESK_SESSION_PATH`: Session file for the `file` backend
//! - `SHOPDESK_KEYCHAIN_SERVICE`: Keychain service name
//! - `SHOPDESK_LOG_LEVEL`: Log filter directive
//! - `SHOPDESK_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./shopdesk.{toml,json}` then `./config.{toml,json}`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::ConfigError;
use super::types::{
    ApiSettings, AppConfig, AuthSettings, LoggingSettings, StorageBackend, StorageSettings,
    DEFAULT_TIMEOUT_SECS,
};

const CONFIG_FILE_NAMES: [&str; 4] = ["shopdesk.toml", "shopdesk.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the client id is
/// not set there, falls back to loading from a config file.
///
/// # Errors
/// Returns [`ConfigError`] if neither source yields a configuration, or a
/// value present in the chosen source is invalid.
pub fn load() -> Result<AppConfig, ConfigError> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(ConfigError::MissingEnv(var)) => {
            tracing::debug!(missing = %var, "Environment incomplete, trying config file");
            load_from_file(None)
        }
        Err(e) => Err(e),
    }
}

/// Load configuration from environment variables
///
/// See module documentation for the complete list.
///
/// # Errors
/// Returns [`ConfigError::MissingEnv`] if `SHOPDESK_CLIENT_ID` is missing and
/// [`ConfigError::InvalidValue`] for unparsable values.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    let mut auth = AuthSettings::new(env_var("SHOPDESK_CLIENT_ID")?);
    if let Some(server) = env_opt("SHOPDESK_AUTH_SERVER") {
        auth.authorization_server = server;
    }
    if let Some(path) = env_opt("SHOPDESK_AUTHORIZE_PATH") {
        auth.authorize_path = path;
    }
    if let Some(path) = env_opt("SHOPDESK_TOKEN_PATH") {
        auth.token_path = path;
    }
    if let Some(uri) = env_opt("SHOPDESK_REDIRECT_URI") {
        auth.redirect_uri = uri;
    }
    if let Some(scopes) = env_opt("SHOPDESK_SCOPES") {
        auth.scopes = split_scopes(&scopes);
    }
    auth.request_timeout_secs = env_parse("SHOPDESK_REQUEST_TIMEOUT", DEFAULT_TIMEOUT_SECS)?;

    let api = ApiSettings {
        base_url: env_opt("SHOPDESK_API_BASE_URL").unwrap_or_else(|| ApiSettings::default().base_url),
        timeout_secs: env_parse("SHOPDESK_API_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
    };

    let mut storage = StorageSettings {
        backend: env_parse("SHOPDESK_STORAGE", StorageBackend::default())?,
        path: env_opt("SHOPDESK_SESSION_PATH").map(PathBuf::from),
        ..StorageSettings::default()
    };
    if let Some(service) = env_opt("SHOPDESK_KEYCHAIN_SERVICE") {
        storage.keychain_service = service;
    }

    let logging = LoggingSettings {
        level: env_opt("SHOPDESK_LOG_LEVEL").unwrap_or_else(|| LoggingSettings::default().level),
        json: env_bool("SHOPDESK_LOG_JSON", false)?,
    };

    Ok(AppConfig { auth, api, storage, logging })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns [`ConfigError`] if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid or the client id is missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::FileNotFound(p));
            }
            p
        }
        None => probe_config_paths().ok_or(ConfigError::NoConfigFile)?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ConfigError::Read { path: config_path.clone(), message: e.to_string() })?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<AppConfig, ConfigError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "TOML", message: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "JSON", message: e.to_string() }),
        _ => Err(ConfigError::UnsupportedFormat(extension.to_string())),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.extend([exe_dir.clone(), exe_dir.join(".."), exe_dir.join("../..")]);
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String, ConfigError> {
    env_opt(key).ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

/// Optional environment variable; blank counts as unset
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an optional environment variable, falling back to `default`
fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::invalid(key, e.to_string())),
        None => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = env_opt(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("'{other}' is not a boolean"))),
    }
}

fn split_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
