//! Runtime configuration, loaded from environment variables with `.env`
//! support. Mirrors the env-var-with-fallback idiom used throughout the
//! rest of this codebase rather than a config-file format.

use std::env;

/// Process-wide configuration, constructed once at startup and shared via
/// `Arc` alongside the pool, registry and cache (see `AppState` in `lib.rs`).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub iqr_multiplier: f64,
    pub cache_max_bytes: u64,
    pub cache_ttl_seconds: u64,
    pub query_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set (Postgres-compatible)"))?;

        let iqr_multiplier = env::var("IQR_MULTIPLIER")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|&v| v > 0.0)
            .unwrap_or(5.0);

        let cache_max_bytes = env::var("CACHE_MAX_BYTES")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(64 * 1024 * 1024);

        let cache_ttl_seconds = env::var("CACHE_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(300);

        let query_timeout_ms = env::var("QUERY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10_000);

        Ok(Self {
            database_url,
            iqr_multiplier,
            cache_max_bytes,
            cache_ttl_seconds,
            query_timeout_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_when_env_absent() {
        env::remove_var("IQR_MULTIPLIER");
        env::remove_var("CACHE_MAX_BYTES");
        env::remove_var("DATABASE_URL");
        env::set_var("DATABASE_URL", "postgres://localhost/test");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.iqr_multiplier, 5.0);
        assert_eq!(cfg.cache_ttl_seconds, 300);
        env::remove_var("DATABASE_URL");
    }
}
