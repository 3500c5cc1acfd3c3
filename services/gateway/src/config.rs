use std::env;
use std::time::Duration;

/// Process-wide configuration, read from environment variables the way
/// `services/server::main` reads `DATABASE_URL` — no config file, no CLI
/// flags, since this is a long-running HTTP service rather than a one-shot
/// binary.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub router_base_url: String,
    pub redis_url: Option<String>,
    pub endpoint_connection_limit: usize,
    pub endpoint_connection_limit_per_host: usize,
    pub endpoint_timeout: Duration,
    pub pool_size: usize,
    pub streaming_timeout: Duration,
    pub client_max_size: u64,
    pub max_stream_epoch_duration: Duration,
    pub max_stream_epoch_duration_total: Duration,
    pub client_retry_budget_threshold: f64,
    pub client_retry_budget_ttl: Duration,
    pub client_retry_budget_window_size: usize,
    pub splitting_factor: u32,
    pub fallback_mseed_record_size: usize,
    pub cache_default_timeout: Duration,
    pub cache_compress: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8090"),
            router_base_url: env_or("ROUTER_BASE_URL", "http://localhost:8080"),
            redis_url: env::var("REDIS_URL").ok(),
            endpoint_connection_limit: env_parse("ENDPOINT_CONNECTION_LIMIT", 100),
            endpoint_connection_limit_per_host: env_parse("ENDPOINT_CONNECTION_LIMIT_PER_HOST", 10),
            endpoint_timeout: Duration::from_secs(env_parse("ENDPOINT_TIMEOUT_SECS", 30)),
            pool_size: env_parse("POOL_SIZE", 10),
            streaming_timeout: Duration::from_secs(env_parse("STREAMING_TIMEOUT_SECS", 60)),
            client_max_size: env_parse("CLIENT_MAX_SIZE", 10 * 1024 * 1024),
            max_stream_epoch_duration: Duration::from_secs(env_parse("MAX_STREAM_EPOCH_DURATION_SECS", 172_800)),
            max_stream_epoch_duration_total: Duration::from_secs(env_parse(
                "MAX_STREAM_EPOCH_DURATION_TOTAL_SECS",
                604_800,
            )),
            client_retry_budget_threshold: env_parse("CLIENT_RETRY_BUDGET_THRESHOLD", 0.6),
            client_retry_budget_ttl: Duration::from_secs(env_parse("CLIENT_RETRY_BUDGET_TTL_SECS", 3600)),
            client_retry_budget_window_size: env_parse("CLIENT_RETRY_BUDGET_WINDOW_SIZE", 50),
            splitting_factor: env_parse("SPLITTING_FACTOR", 2),
            fallback_mseed_record_size: env_parse("FALLBACK_MSEED_RECORD_SIZE", 0),
            cache_default_timeout: Duration::from_secs(env_parse("CACHE_DEFAULT_TIMEOUT_SECS", 600)),
            cache_compress: env_parse("CACHE_COMPRESS", true),
        }
    }
}
