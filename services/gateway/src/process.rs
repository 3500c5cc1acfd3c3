//! Request processor (C8): the common lifecycle -- cache lookup, routing,
//! worker-pool dispatch, format-specific merge, cache write-through, stats
//! garbage collection -- wrapping the two response orderings the original
//! distinguishes as `RequestProcessor`/`StreamingRequestProcessor`
//! subclasses. Grounded on
//! `eidaws.federator.utils.process.RequestProcessor`'s `_run` and
//! `eidaws.federator.utils.mixin.ClientRetryBudgetMixin`.

use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::warn;

use eida_model::{Route, Stream, StreamEpoch};

use crate::cache::{self, Cache};
use crate::config::Config;
use crate::error::GatewayError;
use crate::pool::Pool;
use crate::routing_client::{self, RoutingResult};
use crate::stats::Stats;
use crate::worker::miniseed::MiniseedAssembler;
use crate::worker::stationxml::{self, MergeLevel};
use crate::worker::wfcatalog::WfcatalogAssembler;
use crate::worker::{availability, simple, FetchOutcome, SimpleFormat};

/// The response format a request is being processed for. Each variant
/// picks its own dispatch granularity and merge strategy (spec.md §4.7/8).
#[derive(Debug, Clone)]
pub enum Format {
    MiniSeed,
    StationXml(MergeLevel),
    Simple(SimpleFormat),
    WfCatalog,
    AvailabilityExtent,
}

impl Format {
    fn cache_tag(&self) -> &'static str {
        match self {
            Format::MiniSeed => "dataselect",
            Format::StationXml(_) => "station",
            Format::Simple(SimpleFormat::StationText) => "station-text",
            Format::Simple(SimpleFormat::AvailabilityText) => "availability-text",
            Format::Simple(SimpleFormat::AvailabilityJson) => "availability-json",
            Format::Simple(SimpleFormat::AvailabilityGeocsv) => "availability-geocsv",
            Format::WfCatalog => "wfcatalog",
            Format::AvailabilityExtent => "availability-extent",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            Format::MiniSeed => "application/vnd.fdsn.mseed",
            Format::StationXml(_) => "application/xml",
            Format::Simple(SimpleFormat::AvailabilityJson) => "application/json",
            Format::Simple(_) => "text/plain",
            Format::WfCatalog => "application/json",
            Format::AvailabilityExtent => "text/plain",
        }
    }
}

pub struct ProcessRequest {
    pub service: &'static str,
    pub format: Format,
    pub stream_epochs: Vec<StreamEpoch>,
    pub extra_params: HashMap<String, String>,
    pub query_params_for_cache: Vec<(String, String)>,
    pub nodata_status: u16,
    /// Whether the client's `Accept-Encoding` names `gzip` -- a cache hit
    /// stored compressed is passed through as-is rather than decompressed.
    pub accept_gzip: bool,
}

pub struct ProcessedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
    pub gzip_encoded: bool,
}

/// Shared, process-wide dependencies every request processor call draws on.
pub struct ProcessorContext {
    pub http_client: reqwest::Client,
    pub cache: Cache,
    pub stats: Stats,
    pub config: Arc<Config>,
}

const MAX_SPLIT_DEPTH: u32 = 4;
const MIN_SPLIT_DURATION: Duration = Duration::from_secs(1);

fn stream_epoch_lines(stream_epochs: &[StreamEpoch]) -> Vec<String> {
    stream_epochs.iter().map(|se| se.to_string()).collect()
}

fn endpoint_query_string(se: &StreamEpoch, extra: &HashMap<String, String>) -> String {
    let mut params = vec![
        ("net".to_owned(), se.stream.network.clone()),
        ("sta".to_owned(), se.stream.station.clone()),
        ("loc".to_owned(), se.stream.location.clone()),
        ("cha".to_owned(), se.stream.channel.clone()),
        ("start".to_owned(), eida_model::time::format_fdsn_datetime(se.starttime)),
    ];
    if let Some(end) = se.endtime {
        params.push(("end".to_owned(), eida_model::time::format_fdsn_datetime(end)));
    }
    for (k, v) in extra {
        params.push((k.clone(), v.clone()));
    }
    params
        .into_iter()
        .map(|(k, v)| format!("{k}={}", routing_client::urlencode(&v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn endpoint_url(base: &str, se: &StreamEpoch, extra: &HashMap<String, String>) -> String {
    let sep = if base.contains('?') { '&' } else { '?' };
    format!("{base}{sep}{}", endpoint_query_string(se, extra))
}

async fn fetch_one(client: &reqwest::Client, url: &str, timeout: Duration) -> FetchOutcome {
    match client.get(url).timeout(timeout).send().await {
        Ok(response) => {
            let status = response.status();
            if status.is_success() {
                match response.bytes().await {
                    Ok(bytes) if !bytes.is_empty() => FetchOutcome::Ok(bytes),
                    Ok(_) => FetchOutcome::NoContent,
                    Err(_) => FetchOutcome::Error(502),
                }
            } else if status.as_u16() == 204 || status.as_u16() == 404 {
                FetchOutcome::NoContent
            } else if status.as_u16() == 413 {
                FetchOutcome::TooLarge
            } else if status.is_server_error() {
                FetchOutcome::Error(status.as_u16())
            } else {
                FetchOutcome::Error(503)
            }
        }
        Err(_) => FetchOutcome::Error(503),
    }
}

/// Resolve every requested stream-epoch against the routing store and
/// flatten the results into one route list, recording every URL seen (for
/// post-request stats garbage collection).
async fn resolve_all(
    ctx: &ProcessorContext,
    service: &str,
    stream_epochs: &[StreamEpoch],
    extra_params: &HashMap<String, String>,
) -> Result<(Vec<Route>, Vec<String>), GatewayError> {
    let mut routes = Vec::new();
    let mut touched = Vec::new();
    for se in stream_epochs {
        let result: RoutingResult = routing_client::resolve(
            &ctx.http_client,
            &ctx.config.router_base_url,
            &ctx.stats,
            se,
            service,
            extra_params,
            ctx.config.client_retry_budget_threshold,
            ctx.config.max_stream_epoch_duration,
            ctx.config.max_stream_epoch_duration_total,
        )
        .await?;
        touched.extend(result.routed_urls);
        routes.extend(result.routes);
    }
    Ok((routes, touched))
}

async fn gc_stats(ctx: &ProcessorContext, touched: &[String]) {
    for url in touched {
        if let Err(err) = ctx.stats.gc(url).await {
            warn!(url, error = %err, "failed to garbage-collect endpoint stats");
        }
    }
}

/// Recursively fetch one stream-epoch, splitting on 413 into
/// `splitting_factor` contiguous pieces until success, the retry ceiling,
/// or the minimum split duration is reached.
#[allow(clippy::too_many_arguments)]
fn fetch_with_split<'a, F>(
    client: &'a reqwest::Client,
    stats: &'a Stats,
    base_url: &'a str,
    se: StreamEpoch,
    extra: &'a HashMap<String, String>,
    timeout: Duration,
    splitting_factor: u32,
    depth: u32,
    on_success: &'a F,
) -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send + 'a>>
where
    F: Fn(bytes::Bytes) -> Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send>> + Sync,
{
    Box::pin(async move {
        let url = endpoint_url(base_url, &se, extra);
        let outcome = fetch_one(client, &url, timeout).await;
        match outcome {
            FetchOutcome::Ok(bytes) => {
                stats.add(base_url, 200).await?;
                on_success(bytes).await
            }
            FetchOutcome::NoContent => {
                stats.add(base_url, 204).await?;
                Ok(())
            }
            FetchOutcome::TooLarge => {
                stats.add(base_url, 413).await?;
                let duration = se.duration().unwrap_or(chrono::Duration::zero());
                let too_short = duration.to_std().map(|d| d < MIN_SPLIT_DURATION).unwrap_or(false);
                if depth >= MAX_SPLIT_DEPTH || too_short {
                    warn!(stream = %se.stream, "split-and-align retry ceiling reached, reporting 413 upward");
                    return Err(GatewayError::TooLarge(format!("{} could not be split further", se.stream)));
                }
                let pieces = se.slice(splitting_factor.max(2), se.starttime);
                if pieces.len() < 2 {
                    return Err(GatewayError::TooLarge(format!("{} could not be split further", se.stream)));
                }
                for piece in pieces {
                    fetch_with_split(client, stats, base_url, piece, extra, timeout, splitting_factor, depth + 1, on_success)
                        .await?;
                }
                Ok(())
            }
            FetchOutcome::Error(code) => {
                stats.add(base_url, code).await?;
                Ok(())
            }
        }
    })
}

/// Dispatch one stream-epoch per route through the pool, splitting MiniSEED
/// sub-requests on 413 and de-duplicating the boundary record across
/// retries and across routes serving the same logical stream.
async fn dispatch_miniseed(
    ctx: &ProcessorContext,
    routes: &[Route],
    extra_params: &HashMap<String, String>,
) -> Result<Vec<u8>, GatewayError> {
    let assemblers: Arc<Mutex<BTreeMap<Stream, MiniseedAssembler>>> = Arc::new(Mutex::new(BTreeMap::new()));
    let pool = Pool::new(ctx.config.pool_size);

    for route in routes {
        for se in route.stream_epochs.clone() {
            let client = ctx.http_client.clone();
            let stats = ctx.stats.clone();
            let url = route.url.clone();
            let extra = extra_params.clone();
            let assemblers = assemblers.clone();
            let timeout = ctx.config.endpoint_timeout;
            let splitting_factor = ctx.config.splitting_factor;
            let fallback_record_size = ctx.config.fallback_mseed_record_size;
            let stream = se.stream.clone();

            pool.submit(async move {
                let assemblers = assemblers.clone();
                let on_success = move |bytes: bytes::Bytes| {
                    let assemblers = assemblers.clone();
                    let stream = stream.clone();
                    Box::pin(async move {
                        let mut guard = assemblers.lock().await;
                        let assembler = guard
                            .entry(stream)
                            .or_insert_with(|| MiniseedAssembler::new(fallback_record_size));
                        assembler.append(&bytes)
                    }) as Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send>>
                };
                if let Err(err) =
                    fetch_with_split(&client, &stats, &url, se, &extra, timeout, splitting_factor, 0, &on_success).await
                {
                    warn!(endpoint = url, error = %err, "miniseed sub-request failed permanently");
                }
            });
        }
    }

    if pool.join(Some(ctx.config.streaming_timeout)).await.is_err() {
        warn!("miniseed worker pool timed out before draining");
    }

    let assemblers = Arc::try_unwrap(assemblers).map(|m| m.into_inner()).unwrap_or_default();
    let mut out = Vec::new();
    for (_, assembler) in assemblers {
        out.extend(assembler.into_bytes());
    }
    Ok(out)
}

async fn dispatch_wfcatalog(
    ctx: &ProcessorContext,
    routes: &[Route],
    extra_params: &HashMap<String, String>,
) -> Result<Vec<u8>, GatewayError> {
    let assemblers: Arc<Mutex<BTreeMap<Stream, WfcatalogAssembler>>> = Arc::new(Mutex::new(BTreeMap::new()));
    let pool = Pool::new(ctx.config.pool_size);

    for route in routes {
        for se in route.stream_epochs.clone() {
            let client = ctx.http_client.clone();
            let stats = ctx.stats.clone();
            let url = route.url.clone();
            let extra = extra_params.clone();
            let assemblers = assemblers.clone();
            let timeout = ctx.config.endpoint_timeout;
            let splitting_factor = ctx.config.splitting_factor;
            let stream = se.stream.clone();

            pool.submit(async move {
                let assemblers = assemblers.clone();
                let on_success = move |bytes: bytes::Bytes| {
                    let assemblers = assemblers.clone();
                    let stream = stream.clone();
                    Box::pin(async move {
                        let mut guard = assemblers.lock().await;
                        let assembler = guard.entry(stream).or_insert_with(WfcatalogAssembler::new);
                        assembler.append(&bytes)
                    }) as Pin<Box<dyn Future<Output = Result<(), GatewayError>> + Send>>
                };
                if let Err(err) =
                    fetch_with_split(&client, &stats, &url, se, &extra, timeout, splitting_factor, 0, &on_success).await
                {
                    warn!(endpoint = url, error = %err, "wfcatalog sub-request failed permanently");
                }
            });
        }
    }

    if pool.join(Some(ctx.config.streaming_timeout)).await.is_err() {
        warn!("wfcatalog worker pool timed out before draining");
    }

    let assemblers = Arc::try_unwrap(assemblers).map(|m| m.into_inner()).unwrap_or_default();
    let mut body = Vec::new();
    body.push(b'[');
    let mut first = true;
    for (_, assembler) in assemblers {
        if assembler.is_empty() {
            continue;
        }
        if !first {
            body.push(b',');
        }
        first = false;
        body.extend(assembler.into_bytes());
    }
    body.push(b']');
    Ok(body)
}

async fn dispatch_simple(
    ctx: &ProcessorContext,
    routes: &[Route],
    extra_params: &HashMap<String, String>,
    format: SimpleFormat,
) -> Result<Vec<u8>, GatewayError> {
    let drain: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let pool = Pool::new(ctx.config.pool_size);

    for route in routes {
        for se in route.stream_epochs.clone() {
            let client = ctx.http_client.clone();
            let stats = ctx.stats.clone();
            let url = endpoint_url(&route.url, &se, extra_params);
            let endpoint = route.url.clone();
            let timeout = ctx.config.endpoint_timeout;
            let drain = drain.clone();

            pool.submit(async move {
                let outcome = fetch_one(&client, &url, timeout).await;
                match outcome {
                    FetchOutcome::Ok(bytes) => {
                        let _ = stats.add(&endpoint, 200).await;
                        let stripped = simple::strip_header(format, &bytes);
                        if !stripped.is_empty() {
                            drain.lock().await.push(stripped);
                        }
                    }
                    FetchOutcome::NoContent => {
                        let _ = stats.add(&endpoint, 204).await;
                    }
                    FetchOutcome::TooLarge => {
                        let _ = stats.add(&endpoint, 413).await;
                    }
                    FetchOutcome::Error(code) => {
                        let _ = stats.add(&endpoint, code).await;
                    }
                }
            });
        }
    }

    if pool.join(Some(ctx.config.streaming_timeout)).await.is_err() {
        warn!("simple worker pool timed out before draining");
    }

    let chunks = Arc::try_unwrap(drain).map(|m| m.into_inner()).unwrap_or_default();
    let mut out = Vec::new();
    for chunk in chunks {
        out.extend(chunk);
    }
    Ok(out)
}

async fn dispatch_stationxml(
    ctx: &ProcessorContext,
    routes: &[Route],
    extra_params: &HashMap<String, String>,
    level: MergeLevel,
) -> Result<Vec<u8>, GatewayError> {
    let bodies: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let pool = Pool::new(ctx.config.pool_size);

    for route in routes {
        for se in route.stream_epochs.clone() {
            let client = ctx.http_client.clone();
            let stats = ctx.stats.clone();
            let url = endpoint_url(&route.url, &se, extra_params);
            let endpoint = route.url.clone();
            let timeout = ctx.config.endpoint_timeout;
            let bodies = bodies.clone();

            pool.submit(async move {
                match fetch_one(&client, &url, timeout).await {
                    FetchOutcome::Ok(raw) => {
                        let _ = stats.add(&endpoint, 200).await;
                        if let Ok(text) = String::from_utf8(raw.to_vec()) {
                            bodies.lock().await.push(text);
                        }
                    }
                    FetchOutcome::NoContent => {
                        let _ = stats.add(&endpoint, 204).await;
                    }
                    FetchOutcome::TooLarge => {
                        let _ = stats.add(&endpoint, 413).await;
                    }
                    FetchOutcome::Error(code) => {
                        let _ = stats.add(&endpoint, code).await;
                    }
                }
            });
        }
    }

    if pool.join(Some(ctx.config.streaming_timeout)).await.is_err() {
        warn!("stationxml worker pool timed out before draining");
    }

    let bodies = Arc::try_unwrap(bodies).map(|m| m.into_inner()).unwrap_or_default();
    let merged = stationxml::merge(&bodies, level)?;
    let mut out = Vec::new();
    out.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<FDSNStationXML schemaVersion=\"1.1\">\n");
    out.extend_from_slice(merged.as_bytes());
    out.extend_from_slice(b"\n</FDSNStationXML>\n");
    Ok(out)
}

/// An item a sorted-response worker hands to the priority consumer: its
/// pre-assigned position in the network ordering, plus its rendered bytes.
struct PriorityItem {
    priority: usize,
    line: String,
}

impl PartialEq for PriorityItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}
impl Eq for PriorityItem {}
impl PartialOrd for PriorityItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PriorityItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so a `BinaryHeap` (a max-heap by default) pops the
        // smallest priority first, as a min-heap would.
        other.priority.cmp(&self.priority)
    }
}

/// Drain `rx` as items arrive, writing directly when `priority` matches
/// `expected` and buffering out-of-order items on a min-heap otherwise.
/// Mirrors the consumer loop of the sorted-response processor (spec.md
/// §4.8), even though every item here is already resident in the channel
/// by the time this runs (dispatch buffers full extents, not bytes, before
/// sending).
async fn consume_in_priority_order(mut rx: tokio::sync::mpsc::UnboundedReceiver<PriorityItem>) -> Vec<String> {
    let mut expected = 0usize;
    let mut pending: BinaryHeap<PriorityItem> = BinaryHeap::new();
    let mut ordered = Vec::new();

    while let Some(item) = rx.recv().await {
        if item.priority < expected {
            continue;
        }
        pending.push(item);
        while let Some(top) = pending.peek() {
            if top.priority > expected {
                break;
            }
            let item = pending.pop().unwrap();
            ordered.push(item.line);
            expected = expected.max(item.priority + 1);
        }
    }

    while let Some(item) = pending.pop() {
        ordered.push(item.line);
    }
    ordered
}

/// Priority-ordered dispatch: one job per network, reduced to its
/// extent hulls, emitted through a min-heap-backed consumer so the final
/// byte stream is ordered by network regardless of completion order.
async fn dispatch_availability_extent(ctx: &ProcessorContext, routes: &[Route]) -> Result<Vec<u8>, GatewayError> {
    // A stream served by two different endpoints is reported as no data,
    // not a server error -- the client can't act on it and a retry against
    // a different route wouldn't help (spec's extent-reduction rule).
    let extents = match availability::reduce_extents(routes) {
        Ok(extents) => extents,
        Err(GatewayError::DistributedStreamEpochs(stream)) => {
            warn!(stream, "distributed stream epochs across endpoints, reporting as no data");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut by_network: HashMap<String, Vec<availability::ReducedExtent>> = HashMap::new();
    for extent in extents {
        by_network.entry(extent.stream.network.clone()).or_default().push(extent);
    }
    let mut networks: Vec<String> = by_network.keys().cloned().collect();
    networks.sort();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<PriorityItem>();
    let consumer = tokio::spawn(consume_in_priority_order(rx));
    let pool = Pool::new(ctx.config.pool_size);

    for (priority, network) in networks.into_iter().enumerate() {
        let tx = tx.clone();
        let extents = by_network.remove(&network).unwrap_or_default();
        pool.submit(async move {
            let mut line = String::new();
            for extent in &extents {
                line.push_str(&format!(
                    "{} {} {} {} {} {}\n",
                    extent.stream.network,
                    extent.stream.station,
                    extent.stream.location,
                    extent.stream.channel,
                    eida_model::time::format_fdsn_datetime(extent.start),
                    eida_model::time::format_fdsn_datetime_opt(extent.end),
                ));
            }
            let _ = tx.send(PriorityItem { priority, line });
        });
    }
    drop(tx);

    if pool.join(Some(ctx.config.streaming_timeout)).await.is_err() {
        warn!("availability worker pool timed out before draining");
    }

    let ordered = consumer.await.unwrap_or_default();
    Ok(ordered.concat().into_bytes())
}

/// Run the common lifecycle for one request: cache lookup, routing,
/// dispatch, cache write-through, stats garbage collection.
pub async fn process(ctx: &ProcessorContext, req: ProcessRequest) -> Result<ProcessedResponse, GatewayError> {
    let key = cache::cache_key(req.format.cache_tag(), &req.query_params_for_cache, &stream_epoch_lines(&req.stream_epochs));

    if let Some((body, gzip_encoded)) = ctx.cache.get(&key, req.accept_gzip).await? {
        return Ok(ProcessedResponse {
            status: 200,
            content_type: req.format.content_type(),
            content_disposition: content_disposition_for(&req.format),
            body,
            gzip_encoded,
        });
    }

    let (routes, touched) = resolve_all(ctx, req.service, &req.stream_epochs, &req.extra_params).await?;
    if routes.is_empty() {
        gc_stats(ctx, &touched).await;
        return Ok(ProcessedResponse {
            status: req.nodata_status,
            content_type: req.format.content_type(),
            content_disposition: None,
            body: Vec::new(),
            gzip_encoded: false,
        });
    }

    let body = match &req.format {
        Format::MiniSeed => dispatch_miniseed(ctx, &routes, &req.extra_params).await,
        Format::WfCatalog => dispatch_wfcatalog(ctx, &routes, &req.extra_params).await,
        Format::Simple(format) => dispatch_simple(ctx, &routes, &req.extra_params, *format).await,
        Format::StationXml(level) => dispatch_stationxml(ctx, &routes, &req.extra_params, *level).await,
        Format::AvailabilityExtent => dispatch_availability_extent(ctx, &routes).await,
    };

    gc_stats(ctx, &touched).await;

    let body = body?;
    if body.is_empty() {
        return Ok(ProcessedResponse {
            status: req.nodata_status,
            content_type: req.format.content_type(),
            content_disposition: None,
            body: Vec::new(),
            gzip_encoded: false,
        });
    }

    ctx.cache.set(&key, &body, Some(ctx.config.cache_default_timeout)).await?;

    Ok(ProcessedResponse {
        status: 200,
        content_type: req.format.content_type(),
        content_disposition: content_disposition_for(&req.format),
        body,
        gzip_encoded: false,
    })
}

fn content_disposition_for(format: &Format) -> Option<String> {
    match format {
        Format::MiniSeed => Some("attachment; filename=\"fdsnws-dataselect.mseed\"".to_owned()),
        _ => None,
    }
}
