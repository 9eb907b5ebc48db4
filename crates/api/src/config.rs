use std::str::FromStr;

/// Invalid server setting.
#[derive(Debug, thiserror::Error)]
#[error("{key} must be a valid {expected}, got {value:?}")]
pub struct ConfigError {
    pub key: &'static str,
    pub expected: &'static str,
    pub value: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for an in-flight sweep, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default   |
    /// |-------------------------|-----------|
    /// | `HOST`                  | `0.0.0.0` |
    /// | `PORT`                  | `8000`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`      |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "0.0.0.0".into());

        Ok(Self {
            host,
            port: parse_or(&lookup, "PORT", "u16", 8000)?,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", "u64", 30)?,
            shutdown_timeout_secs: parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", "u64", 30)?,
        })
    }
}

fn parse_or<F, T>(
    lookup: &F,
    key: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError {
            key,
            expected,
            value: raw,
        }),
    }
}
