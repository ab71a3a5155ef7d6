//! Process configuration, read from environment variables.
//!
//! `main` loads an optional `.env` file first (`dotenvy`), so the same
//! variables can come from either place.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required `{0}` env variable")]
    Missing(&'static str),

    #[error("unexpected `{name}` env variable: {reason}")]
    Invalid { name: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// How long in-flight requests get after a shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GracePeriod {
    Bounded(Duration),
    Unbounded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Postgres(PostgresConfig),
    Memory,
}

#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub max_connections: u32,
}

impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"****")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum TrackerConfig {
    Redis { addr: String, password: Option<String> },
    Memory,
}

impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerConfig::Redis { addr, password } => f
                .debug_struct("Redis")
                .field("addr", addr)
                .field("password", &password.as_ref().map(|_| "****"))
                .finish(),
            TrackerConfig::Memory => f.write_str("Memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: String,
    pub grace_period: GracePeriod,
    pub store: StoreConfig,
    pub store_timeout: Duration,
    pub tracker: TrackerConfig,
    /// `None` keeps idempotency keys forever.
    pub key_ttl: Option<Duration>,
}

const DEFAULT_GRACE_SECS: i64 = 15;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_KEY_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
/// Ten years.
const MAX_KEY_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let bind_addr = require("BIND_ADDR")?;

        let grace_secs = parse_or("GRACEFUL_SHUTDOWN_TIMEOUT_SEC", get("GRACEFUL_SHUTDOWN_TIMEOUT_SEC"), DEFAULT_GRACE_SECS)?;
        let grace_period = match grace_secs {
            -1 => GracePeriod::Unbounded,
            s if s < -1 => {
                return Err(ConfigError::invalid(
                    "GRACEFUL_SHUTDOWN_TIMEOUT_SEC",
                    "must be -1 (wait forever) or a non-negative number of seconds",
                ));
            }
            s => GracePeriod::Bounded(Duration::from_secs(s as u64)),
        };

        let store = match require("DB_TYPE")?.as_str() {
            "psql" => {
                let port: i64 = parse_or("DB_PORT", Some(require("DB_PORT")?), 0)?;
                if port <= 0 || port > u16::MAX as i64 {
                    return Err(ConfigError::invalid("DB_PORT", "must be between 1 and 65535"));
                }
                let max_connections: u32 = parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), DEFAULT_MAX_CONNECTIONS)?;
                if max_connections == 0 {
                    return Err(ConfigError::invalid("DB_MAX_CONNECTIONS", "must be greater than zero"));
                }
                StoreConfig::Postgres(PostgresConfig {
                    host: require("DB_HOST")?,
                    port: port as u16,
                    database: require("DB_DATABASE_NAME")?,
                    user: require("DB_USER")?,
                    password: require("DB_PASSWORD")?,
                    max_connections,
                })
            }
            "memory" => StoreConfig::Memory,
            other => {
                return Err(ConfigError::invalid("DB_TYPE", format!("`{other}` is not one of psql, memory")));
            }
        };

        let store_timeout_secs: u64 = parse_or("STORE_TIMEOUT_SEC", get("STORE_TIMEOUT_SEC"), DEFAULT_STORE_TIMEOUT_SECS)?;
        if store_timeout_secs == 0 {
            return Err(ConfigError::invalid("STORE_TIMEOUT_SEC", "must be greater than zero"));
        }

        let tracker = match get("IDEMPOTENCY_BACKEND").as_deref().unwrap_or("redis") {
            "redis" => TrackerConfig::Redis {
                addr: require("IDEMPOTENCY_REDIS_ADDR")?,
                password: get("IDEMPOTENCY_REDIS_PASSWORD"),
            },
            "memory" => TrackerConfig::Memory,
            other => {
                return Err(ConfigError::invalid(
                    "IDEMPOTENCY_BACKEND",
                    format!("`{other}` is not one of redis, memory"),
                ));
            }
        };

        let ttl_secs: u64 = parse_or("IDEMPOTENCY_KEY_TTL_SEC", get("IDEMPOTENCY_KEY_TTL_SEC"), DEFAULT_KEY_TTL_SECS)?;
        if ttl_secs > MAX_KEY_TTL_SECS {
            return Err(ConfigError::invalid(
                "IDEMPOTENCY_KEY_TTL_SEC",
                format!("must be at most {MAX_KEY_TTL_SECS}; use 0 to keep keys forever"),
            ));
        }
        let key_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        Ok(Self {
            bind_addr,
            grace_period,
            store,
            store_timeout: Duration::from_secs(store_timeout_secs),
            tracker,
            key_ttl,
        })
    }
}

fn parse_or<T: std::str::FromStr>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, format!("cannot parse `{raw}`: {e}"))),
    }
}
