//! Per-endpoint rolling response-code time series, backed by a Redis
//! sorted set keyed by the endpoint's canonical key (URL path joined with
//! its netloc). Members are `"<code>:<score>:<8 random hex bytes>"`; the
//! random suffix avoids collisions when two responses land in the same
//! second. Grounded on `eidaws.federator.utils.stats.ResponseCodeStats` /
//! `ResponseCodeTimeSeries`.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngCore;
use redis::AsyncCommands;

use crate::error::GatewayError;

const KEY_PREFIX: &str = "eida:federator:stats:";

fn canonical_key(endpoint_url: &str) -> String {
    let (netloc, path) = match endpoint_url.split_once("://") {
        Some((_, rest)) => match rest.split_once('/') {
            Some((netloc, path)) => (netloc, format!("/{path}")),
            None => (rest, String::new()),
        },
        None => (endpoint_url, String::new()),
    };
    format!("{KEY_PREFIX}{path}@{netloc}")
}

fn now_unix() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("clock before epoch").as_secs_f64()
}

fn random_suffix() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[derive(Clone)]
pub struct Stats {
    client: Option<redis::Client>,
    window_size: usize,
    ttl_secs: i64,
}

impl Stats {
    pub fn new(redis_url: Option<&str>, window_size: usize, ttl_secs: i64) -> Self {
        Self {
            client: redis_url.map(|url| redis::Client::open(url).expect("invalid REDIS_URL")),
            window_size,
            ttl_secs,
        }
    }

    async fn connection(&self) -> Result<Option<redis::aio::MultiplexedConnection>, GatewayError> {
        match &self.client {
            Some(client) => Ok(Some(client.get_multiplexed_async_connection().await?)),
            None => Ok(None),
        }
    }

    /// Append `code` for `endpoint_url`, trimming the oldest member first if
    /// the set would exceed `window_size`. A no-op (stats disabled) when no
    /// Redis backend is configured.
    ///
    /// Multiple processes share the same counter, so the read-trim-write
    /// sequence runs as a `WATCH`/`MULTI`/`EXEC` optimistic transaction:
    /// if another writer touches the key between the `zcard` read and the
    /// `EXEC`, the transaction aborts and we retry with a short delay
    /// instead of silently letting the window grow past `window_size`.
    pub async fn add(&self, endpoint_url: &str, code: u16) -> Result<(), GatewayError> {
        let Some(mut conn) = self.connection().await? else {
            return Ok(());
        };
        let key = canonical_key(endpoint_url);
        let now = now_unix();
        let member = format!("{code}:{now}:{}", random_suffix());

        const MAX_ATTEMPTS: u32 = 5;
        for attempt in 0..MAX_ATTEMPTS {
            let _: () = redis::cmd("WATCH").arg(&key).query_async(&mut conn).await?;
            let size: isize = conn.zcard(&key).await?;

            let mut pipe = redis::pipe();
            pipe.atomic();
            if size as usize >= self.window_size {
                pipe.zremrangebyrank(&key, 0, (size as usize - self.window_size) as isize);
            }
            pipe.zadd(&key, &member, now);

            let committed: Option<()> = pipe.query_async(&mut conn).await?;
            if committed.is_some() {
                return Ok(());
            }

            tokio::time::sleep(std::time::Duration::from_millis(10 * u64::from(attempt + 1))).await;
        }

        let _: () = redis::cmd("UNWATCH").query_async(&mut conn).await?;
        Err(GatewayError::RoutingFailure(format!(
            "stats update for {key} lost the optimistic-concurrency race {MAX_ATTEMPTS} times in a row"
        )))
    }

    /// Remove members older than `ttl_secs`.
    pub async fn gc(&self, endpoint_url: &str) -> Result<(), GatewayError> {
        let Some(mut conn) = self.connection().await? else {
            return Ok(());
        };
        let key = canonical_key(endpoint_url);
        let cutoff = now_unix() - self.ttl_secs as f64;
        let _: () = conn.zrembyscore(&key, f64::NEG_INFINITY, cutoff).await?;
        Ok(())
    }

    /// Fraction of members within the TTL window whose code is 500 or 503.
    /// An empty window reports 0.
    pub async fn error_ratio(&self, endpoint_url: &str) -> Result<f64, GatewayError> {
        let Some(mut conn) = self.connection().await? else {
            return Ok(0.0);
        };
        let key = canonical_key(endpoint_url);
        let window_start = now_unix() - self.ttl_secs as f64;
        let members: Vec<String> = conn.zrangebyscore(&key, window_start, now_unix()).await?;
        if members.is_empty() {
            return Ok(0.0);
        }
        let errors = members
            .iter()
            .filter(|m| m.starts_with("500:") || m.starts_with("503:"))
            .count();
        Ok(errors as f64 / members.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_joins_path_and_netloc() {
        assert_eq!(
            canonical_key("http://eida.ethz.ch/fdsnws/dataselect/1/query"),
            format!("{KEY_PREFIX}/fdsnws/dataselect/1/query@eida.ethz.ch")
        );
    }

    #[tokio::test]
    async fn disabled_backend_reports_zero_error_ratio() {
        let stats = Stats::new(None, 50, 3600);
        assert_eq!(stats.error_ratio("http://x/y").await.unwrap(), 0.0);
        stats.add("http://x/y", 503).await.unwrap();
    }
}
