//! Startup configuration, read once from the environment (and `.env`).

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CONVERSION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_TEMPLATE_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Explicit path to `soffice`; discovery is used when unset.
    pub libreoffice_path: Option<PathBuf>,
    pub conversion_timeout: Duration,
    pub fetch_timeout: Duration,
    pub max_template_bytes: u64,
    /// Parent directory for per-request workspaces; system temp dir when unset.
    pub workspace_dir: Option<PathBuf>,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            libreoffice_path: None,
            conversion_timeout: Duration::from_secs(DEFAULT_CONVERSION_TIMEOUT_SECS),
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_template_bytes: DEFAULT_MAX_TEMPLATE_BYTES,
            workspace_dir: None,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(v) => parse::<u16>("PORT", "port number", v)?,
            None => defaults.port,
        };
        let conversion_timeout = match get("CONVERSION_TIMEOUT_SECS") {
            Some(v) => seconds("CONVERSION_TIMEOUT_SECS", v)?,
            None => defaults.conversion_timeout,
        };
        let fetch_timeout = match get("TEMPLATE_FETCH_TIMEOUT_SECS") {
            Some(v) => seconds("TEMPLATE_FETCH_TIMEOUT_SECS", v)?,
            None => defaults.fetch_timeout,
        };
        let max_template_bytes = match get("MAX_TEMPLATE_BYTES") {
            Some(v) => match parse::<u64>("MAX_TEMPLATE_BYTES", "byte count", v)? {
                0 => return Err(ConfigError::Zero("MAX_TEMPLATE_BYTES")),
                n => n,
            },
            None => defaults.max_template_bytes,
        };

        Ok(Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            libreoffice_path: get("LIBREOFFICE_PATH").map(PathBuf::from),
            conversion_timeout,
            fetch_timeout,
            max_template_bytes,
            workspace_dir: get("WORKSPACE_DIR").map(PathBuf::from),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

fn parse<T: std::str::FromStr>(
    name: &'static str,
    expected: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        name,
        expected,
        value,
    })
}

fn seconds(name: &'static str, value: String) -> Result<Duration, ConfigError> {
    match parse::<u64>(name, "number of seconds", value)? {
        0 => Err(ConfigError::Zero(name)),
        secs => Ok(Duration::from_secs(secs)),
    }
}
