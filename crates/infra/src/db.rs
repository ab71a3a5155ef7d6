//! PostgreSQL connection pool and schema migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::{debug, info, instrument};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub options: PgConnectOptions,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl DatabaseConfig {
    pub fn new(options: PgConnectOptions) -> Self {
        Self {
            options,
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }

    /// Build from discrete connection parameters. The password never passes
    /// through a URL, so it needs no escaping.
    pub fn from_parts(host: &str, port: u16, database: &str, user: &str, password: &str) -> Self {
        Self::new(
            PgConnectOptions::new()
                .host(host)
                .port(port)
                .database(database)
                .username(user)
                .password(password),
        )
    }

    pub fn from_url(url: &str) -> Result<Self, sqlx::Error> {
        Ok(Self::new(PgConnectOptions::from_str(url)?))
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self.min_connections = self.min_connections.min(max_connections);
        self
    }
}

/// Open a connection pool.
#[instrument(skip_all, fields(host = config.options.get_host(), database = ?config.options.get_database()))]
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    debug!(
        max_conn = config.max_connections,
        min_conn = config.min_connections,
        "creating connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .connect_with(config.options.clone())
        .await?;

    info!("database pool ready");
    Ok(pool)
}

/// Apply the embedded schema migrations.
#[instrument(skip_all)]
pub async fn migrate(pool: &PgPool) -> Result<(), MigrateError> {
    debug!("running migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    debug!("migrations completed");
    Ok(())
}
