//! Full-response cache backend: a `Null` variant (buffering disabled) and a
//! Redis-backed key-value variant with gzip compression on write. Grounded
//! on `eidaws.federator.utils.cache.Cache`/`NullCache`/`RedisCache`.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use redis::AsyncCommands;

use crate::error::GatewayError;

#[derive(Clone)]
pub enum Cache {
    Null,
    Redis { client: redis::Client, compress: bool },
}

impl Cache {
    pub fn new(redis_url: Option<&str>, compress: bool) -> Self {
        match redis_url {
            Some(url) => Cache::Redis {
                client: redis::Client::open(url).expect("invalid REDIS_URL"),
                compress,
            },
            None => Cache::Null,
        }
    }

    /// Fetch the cached value for `key`. `raw` requests the stored
    /// (possibly gzip-compressed) bytes without decompression, for passing
    /// through with `Content-Encoding: gzip`. Returns `(bytes, is_gzipped)`.
    pub async fn get(&self, key: &str, raw: bool) -> Result<Option<(Vec<u8>, bool)>, GatewayError> {
        match self {
            Cache::Null => Ok(None),
            Cache::Redis { client, compress } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let stored: Option<Vec<u8>> = conn.get(key).await?;
                let Some(stored) = stored else {
                    return Ok(None);
                };
                if !*compress || raw {
                    return Ok(Some((stored, *compress)));
                }
                let mut decoder = GzDecoder::new(stored.as_slice());
                let mut decompressed = Vec::new();
                decoder
                    .read_to_end(&mut decompressed)
                    .map_err(|e| GatewayError::Parser(format!("corrupt cache entry: {e}")))?;
                Ok(Some((decompressed, false)))
            }
        }
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl: Option<std::time::Duration>) -> Result<(), GatewayError> {
        match self {
            Cache::Null => Ok(()),
            Cache::Redis { client, compress } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let payload = if *compress {
                    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(value).expect("in-memory gzip write");
                    encoder.finish().expect("in-memory gzip finish")
                } else {
                    value.to_vec()
                };
                match ttl {
                    Some(ttl) => {
                        let _: () = conn.set_ex(key, payload, ttl.as_secs()).await?;
                    }
                    None => {
                        let _: () = conn.set(key, payload).await?;
                    }
                }
                Ok(())
            }
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        match self {
            Cache::Null => Ok(()),
            Cache::Redis { client, .. } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                let _: () = conn.del(key).await?;
                Ok(())
            }
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, GatewayError> {
        match self {
            Cache::Null => Ok(false),
            Cache::Redis { client, .. } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                Ok(conn.exists(key).await?)
            }
        }
    }

    pub async fn flush_all(&self) -> Result<(), GatewayError> {
        match self {
            Cache::Null => Ok(()),
            Cache::Redis { client, .. } => {
                let mut conn = client.get_multiplexed_async_connection().await?;
                redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn).await?;
                Ok(())
            }
        }
    }
}

/// Cache key construction: `base64(md5(processor_type_tag ++ sorted query
/// params (minus nodata/service) ++ sorted stream-epoch lines))`, truncated
/// to 16 chars. Control characters are stripped from every input first.
pub fn cache_key(processor_type_tag: &str, query_params: &[(String, String)], stream_epoch_lines: &[String]) -> String {
    fn strip_control(s: &str) -> String {
        s.chars().filter(|c| !c.is_control()).collect()
    }

    let mut params: Vec<(String, String)> = query_params
        .iter()
        .filter(|(k, _)| k != "nodata" && k != "service")
        .map(|(k, v)| (strip_control(k), strip_control(v)))
        .collect();
    params.sort();

    let mut lines: Vec<String> = stream_epoch_lines.iter().map(|l| strip_control(l)).collect();
    lines.sort();

    let mut buf = strip_control(processor_type_tag);
    for (k, v) in &params {
        buf.push_str(k);
        buf.push('=');
        buf.push_str(v);
    }
    for line in &lines {
        buf.push_str(line);
    }

    let digest = md5::compute(buf.as_bytes());
    let encoded = base64::encode(digest.0);
    encoded.chars().take(16).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_ignores_nodata_and_service_and_is_order_independent() {
        let a = cache_key(
            "dataselect",
            &[("nodata".into(), "204".into()), ("format".into(), "miniseed".into())],
            &["CH HASLI -- LHZ 2019-01-01 2019-01-02".into()],
        );
        let b = cache_key(
            "dataselect",
            &[("format".into(), "miniseed".into()), ("nodata".into(), "404".into())],
            &["CH HASLI -- LHZ 2019-01-01 2019-01-02".into()],
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn null_cache_always_misses() {
        let cache = Cache::Null;
        assert!(cache.get("k", false).await.unwrap().is_none());
        cache.set("k", b"v", None).await.unwrap();
        assert!(!cache.exists("k").await.unwrap());
    }
}
