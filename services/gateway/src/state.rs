//! Process-wide shared state: the outbound HTTP client (with the
//! configured per-host/total connection limits), cache, stats backend and
//! config, wrapped once at startup and handed to every handler as axum
//! `State`. Grounded on `services/router::state::AppState`.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::config::Config;
use crate::process::ProcessorContext;
use crate::stats::Stats;

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Cache,
    pub stats: Stats,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(config.endpoint_connection_limit_per_host)
            .timeout(config.endpoint_timeout)
            .build()
            .expect("failed to build the endpoint HTTP client");

        let cache = Cache::new(config.redis_url.as_deref(), config.cache_compress);
        let stats = Stats::new(
            config.redis_url.as_deref(),
            config.client_retry_budget_window_size,
            config.client_retry_budget_ttl.as_secs() as i64,
        );

        Self { config, cache, stats, http_client }
    }

    pub fn processor_context(&self) -> ProcessorContext {
        ProcessorContext {
            http_client: self.http_client.clone(),
            cache: self.cache.clone(),
            stats: self.stats.clone(),
            config: self.config.clone(),
        }
    }

    pub fn streaming_timeout(&self) -> Duration {
        self.config.streaming_timeout
    }

    pub fn client_max_size(&self) -> u64 {
        self.config.client_max_size
    }
}
