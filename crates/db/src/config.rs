use crate::DEFAULT_MAX_CONNECTIONS;

/// Default time to wait for a pooled connection.
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} must be a valid {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Upper bound on pooled connections (default: `20`).
    pub max_connections: u32,
    /// Seconds to wait for a free connection (default: `30`).
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    /// Load a `.env` file if present, then read the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default    |
    /// |---------------------------|------------|
    /// | `DATABASE_URL`            | (required) |
    /// | `DB_MAX_CONNECTIONS`      | `20`       |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `30`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", "u32", DEFAULT_MAX_CONNECTIONS)?;
        let acquire_timeout_secs = parse_or(
            &lookup,
            "DB_ACQUIRE_TIMEOUT_SECS",
            "u64",
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout_secs,
        })
    }
}

fn parse_or<F, T>(
    lookup: &F,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}
