//! Application configuration loaded from environment variables.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use orchestrator::Timeouts;
use thiserror::Error;

/// Errors detected while reading the configuration at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `JWT_SECRET` is absent or empty.
    #[error("JWT_SECRET must be set to a non-empty value")]
    MissingSecret,

    /// A variable is present but cannot be parsed.
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Gateway configuration.
///
/// Reads from environment variables:
/// - `HOST` (default `0.0.0.0`), `PORT` (default `3000`)
/// - `RUST_LOG` (default `info`), `LOG_FORMAT` (`text` or `json`)
/// - `JWT_SECRET` (required), `TOKEN_TTL_HOURS` (default `24`)
/// - `READ_TIMEOUT_SECS` (default `5`), `WRITE_TIMEOUT_SECS` (default `10`)
/// - `DATABASE_URL`: PostgreSQL stores when set, in-memory stores otherwise
/// - `MEDIA_ROOT`, `MEDIA_PUBLIC_BASE` (default `/media`): local-disk media
///   when `MEDIA_ROOT` is set, in-memory media otherwise
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub database_url: Option<String>,
    pub media_root: Option<PathBuf>,
    pub media_public_base: String,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET").ok_or(ConfigError::MissingSecret)?;

        let log_format = match var("LOG_FORMAT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "LOG_FORMAT",
                value,
            })?,
            None => LogFormat::default(),
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, "PORT", 3000)?,
            log_level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format,
            jwt_secret,
            token_ttl: Duration::from_secs(parse_or(&var, "TOKEN_TTL_HOURS", 24u64)? * 3600),
            read_timeout: Duration::from_secs(parse_or(&var, "READ_TIMEOUT_SECS", 5)?),
            write_timeout: Duration::from_secs(parse_or(&var, "WRITE_TIMEOUT_SECS", 10)?),
            database_url: var("DATABASE_URL"),
            media_root: var("MEDIA_ROOT").map(PathBuf::from),
            media_public_base: var("MEDIA_PUBLIC_BASE").unwrap_or_else(|| "/media".to_string()),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the per-call deadlines.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            read: self.read_timeout,
            write: self.write_timeout,
        }
    }
}

fn parse_or<T, F>(var: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("media_root", &self.media_root)
            .field("media_public_base", &self.media_public_base)
            .finish()
    }
}
