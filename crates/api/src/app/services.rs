//! Backend wiring: picks the ledger store and idempotency tracker named by
//! the configuration and composes them into a [`WalletService`].

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use wallets_infra::db::{self, DatabaseConfig};
use wallets_infra::service::{SharedLedgerStore, SharedTracker};
use wallets_infra::{
    DeadlineLedgerStore, InMemoryIdempotencyTracker, InMemoryLedgerStore, PostgresLedgerStore,
    WalletService,
};
use wallets_observability::{Metrics, MetricsError};

use crate::config::{Config, PostgresConfig, StoreConfig, TrackerConfig};

#[derive(Clone)]
pub struct AppServices {
    pub wallets: WalletService,
    pub metrics: Arc<Metrics>,
}

impl AppServices {
    pub fn new(wallets: WalletService, metrics: Arc<Metrics>) -> Self {
        Self { wallets, metrics }
    }

    /// Process-local backends with the default store deadline.
    pub fn in_memory() -> Result<Self, MetricsError> {
        let store: SharedLedgerStore = Arc::new(DeadlineLedgerStore::new(
            InMemoryLedgerStore::new(),
            wallets_infra::ledger_store::DEFAULT_STORE_TIMEOUT,
        ));
        let tracker: SharedTracker = Arc::new(InMemoryIdempotencyTracker::default());
        Ok(Self::new(WalletService::new(store, tracker), Arc::new(Metrics::new()?)))
    }
}

pub async fn build_services(config: &Config, metrics: Arc<Metrics>) -> anyhow::Result<AppServices> {
    let store: SharedLedgerStore = match &config.store {
        StoreConfig::Postgres(pg) => {
            let backend = connect_postgres(pg).await?;
            Arc::new(DeadlineLedgerStore::new(backend, config.store_timeout))
        }
        StoreConfig::Memory => {
            warn!("using in-memory ledger store; balances do not survive a restart");
            Arc::new(DeadlineLedgerStore::new(InMemoryLedgerStore::new(), config.store_timeout))
        }
    };

    let tracker: SharedTracker = match &config.tracker {
        TrackerConfig::Redis { addr, password } => connect_redis(addr, password.clone(), config).await?,
        TrackerConfig::Memory => {
            warn!("using in-memory idempotency tracker; keys are not shared between replicas");
            Arc::new(InMemoryIdempotencyTracker::new(config.key_ttl))
        }
    };

    Ok(AppServices::new(WalletService::new(store, tracker), metrics))
}

async fn connect_postgres(pg: &PostgresConfig) -> anyhow::Result<PostgresLedgerStore> {
    let db_config = DatabaseConfig::from_parts(&pg.host, pg.port, &pg.database, &pg.user, &pg.password)
        .with_max_connections(pg.max_connections);
    let pool = db::connect(&db_config)
        .await
        .with_context(|| format!("connecting to postgres at {}:{}", pg.host, pg.port))?;
    db::migrate(&pool).await.context("running ledger migrations")?;
    info!(host = %pg.host, database = %pg.database, "ledger store ready");
    Ok(PostgresLedgerStore::new(pool))
}

#[cfg(feature = "redis")]
async fn connect_redis(addr: &str, password: Option<String>, config: &Config) -> anyhow::Result<SharedTracker> {
    let tracker = wallets_infra::RedisIdempotencyTracker::connect(addr, password, config.key_ttl)
        .await
        .with_context(|| format!("connecting to redis at {addr}"))?;
    Ok(Arc::new(tracker))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_addr: &str, _password: Option<String>, _config: &Config) -> anyhow::Result<SharedTracker> {
    anyhow::bail!("built without redis support; set IDEMPOTENCY_BACKEND=memory")
}
