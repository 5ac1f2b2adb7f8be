//! Shared process state: one pool, one schema contract, one rule registry,
//! one aggregation cache, constructed once at startup and handed out as
//! `Arc`-wrapped clones to every call site (CLI command, aggregation query).

use crate::aggregate::AggregateCache;
use crate::config::Config;
use crate::contract::SchemaContract;
use crate::rules::RuleRegistry;
use crate::db;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub contract: Arc<SchemaContract>,
    pub registry: Arc<RuleRegistry>,
    pub cache: Arc<AggregateCache>,
}

impl AppState {
    /// Connects the pool, applies the idempotent schema DDL, and constructs
    /// the contract/registry/cache singletons. Called once at process start
    /// by both the ingest CLI and the aggregate CLI.
    pub async fn bootstrap(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database_url).await?;
        db::run_migrations(&pool).await?;

        let cache = AggregateCache::new(config.cache_max_bytes, config.cache_ttl_seconds);

        Ok(Self {
            pool,
            contract: Arc::new(SchemaContract::condo_v2()),
            registry: Arc::new(RuleRegistry::new()),
            cache: Arc::new(cache),
            config: Arc::new(config),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
