//! The routing-store resolution algorithm: virtual-network expansion,
//! channel-epoch join, epoch intersection, canonicalization, and
//! grouping-by-endpoint.
//!
//! Grounded on `eidaws.stationlite.engine.db_query`'s `resolve_vnetwork` and
//! `find_streamepochs_and_routes`, reshaped onto a flat Postgres schema with
//! raw `sqlx::query` (no compile-time macros), in the style of
//! `repo/reads.rs`.

use chrono::Duration;
use eida_model::time::is_open_end;
use eida_model::{Route, Stream, StreamEpoch, StreamEpochsHandler};
use sqlx::{PgPool, Row};

use crate::error::RouterError;

const KNOWN_SERVICES: &[&str] = &["station", "dataselect", "wfcatalog", "availability"];

#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub minlat: f64,
    pub maxlat: f64,
    pub minlon: f64,
    pub maxlon: f64,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self {
            minlat: -90.0,
            maxlat: 90.0,
            minlon: -180.0,
            maxlon: 180.0,
        }
    }
}

impl BoundingBox {
    fn validate(&self) -> Result<(), RouterError> {
        if self.minlat >= self.maxlat || self.minlon >= self.maxlon {
            return Err(RouterError::InvalidBbox);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Network,
    Station,
    Channel,
}

impl Level {
    pub fn parse(s: &str) -> Self {
        match s {
            "network" => Level::Network,
            "station" => Level::Station,
            _ => Level::Channel,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryParams {
    pub service: String,
    pub level: Level,
    pub access: Option<String>,
    pub method: Option<Vec<String>>,
    pub bbox: BoundingBox,
}

impl QueryParams {
    fn validate(&self) -> Result<(), RouterError> {
        if !KNOWN_SERVICES.contains(&self.service.as_str()) {
            return Err(RouterError::InvalidService(self.service.clone()));
        }
        self.bbox.validate()
    }
}

/// Step 1: virtual-network expansion. Returns an empty `Vec` when
/// `stream_epoch.network` is wildcard-only (nothing to resolve) or no
/// virtual-network group matches.
pub async fn resolve_vnetwork(pool: &PgPool, stream_epoch: &StreamEpoch) -> Result<Vec<StreamEpoch>, RouterError> {
    if stream_epoch.stream.is_wildcard_only_network() {
        return Ok(Vec::new());
    }

    let sql_se = stream_epoch.to_sql_like();
    let rows = sqlx::query(
        r#"SELECT n.code, s.code, v.channel, v.location, v.starttime, v.endtime
           FROM virtual_channel_epochs v
           JOIN virtual_channel_epoch_groups g ON g.id = v.group_id
           JOIN networks n ON n.id = v.network_id
           JOIN stations s ON s.id = v.station_id
           WHERE g.code LIKE $1 ESCAPE '/'
             AND s.code LIKE $2 ESCAPE '/'
             AND v.channel LIKE $3 ESCAPE '/'
             AND v.location LIKE $4 ESCAPE '/'
             AND (v.endtime > $5 OR v.endtime IS NULL)
             AND ($6::timestamptz IS NULL OR v.starttime < $6)"#,
    )
    .bind(&sql_se.stream.network)
    .bind(&sql_se.stream.station)
    .bind(&sql_se.stream.channel)
    .bind(&sql_se.stream.location)
    .bind(stream_epoch.starttime)
    .bind(stream_epoch.endtime)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let network: String = row.try_get(0)?;
        let station: String = row.try_get(1)?;
        let channel: String = row.try_get(2)?;
        let location: String = row.try_get(3)?;
        let starttime: chrono::DateTime<chrono::Utc> = row.try_get(4)?;
        let endtime: Option<chrono::DateTime<chrono::Utc>> = row.try_get(5)?;

        let mut se = StreamEpoch::new(Stream::new(network, station, location, channel), starttime, endtime);
        se = clip_to_window(se, stream_epoch.starttime, stream_epoch.endtime);
        out.push(se);
    }
    Ok(out)
}

fn clip_to_window(
    se: StreamEpoch,
    win_start: chrono::DateTime<chrono::Utc>,
    win_end: Option<chrono::DateTime<chrono::Utc>>,
) -> StreamEpoch {
    let start = se.starttime.max(win_start);
    let end = match (se.endtime, win_end) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };
    StreamEpoch::new(se.stream, start, end)
}

struct JoinedRow {
    channel: String,
    locationcode: String,
    channel_start: chrono::DateTime<chrono::Utc>,
    channel_end: Option<chrono::DateTime<chrono::Utc>>,
    network: String,
    station: String,
    routing_start: chrono::DateTime<chrono::Utc>,
    routing_end: Option<chrono::DateTime<chrono::Utc>>,
    url: String,
}

/// Steps 2-3: the channel-epoch/routing join plus epoch intersection, for a
/// single (already vnet-resolved or literal) stream-epoch.
async fn find_streamepochs_and_routes(
    pool: &PgPool,
    stream_epoch: &StreamEpoch,
    params: &QueryParams,
) -> Result<Vec<JoinedRow>, RouterError> {
    let sql_se = stream_epoch.to_sql_like();

    // Placeholders $1-$6 are always bound (network/station/channel/location/
    // service/starttime); the access clause's $N -- if emitted at all -- and
    // the bbox/endtime placeholders after it must be numbered according to
    // whether it's actually present, not hardcoded, since an absent access
    // clause shifts every later placeholder down by one.
    let mut next_param = 7;
    let access_clause = if params.access.as_deref().unwrap_or("any") == "any" {
        String::new()
    } else {
        let clause = format!("AND ce.restrictedstatus = ${next_param}::restricted_status");
        next_param += 1;
        clause
    };
    let minlat_param = next_param;
    let maxlat_param = next_param + 1;
    let minlon_param = next_param + 2;
    let maxlon_param = next_param + 3;
    let endtime_param = next_param + 4;

    let sql = format!(
        r#"SELECT ce.code, ce.locationcode, ce.starttime, ce.endtime,
                  n.code, s.code, r.starttime, r.endtime, e.url
           FROM channel_epochs ce
           JOIN networks n ON n.id = ce.network_id
           JOIN stations s ON s.id = ce.station_id
           JOIN station_epochs se ON se.station_id = s.id
           JOIN routings r ON r.channel_epoch_id = ce.id
           JOIN endpoints e ON e.id = r.endpoint_id
           JOIN services svc ON svc.id = e.service_id
           WHERE n.code LIKE $1 ESCAPE '/'
             AND s.code LIKE $2 ESCAPE '/'
             AND ce.code LIKE $3 ESCAPE '/'
             AND ce.locationcode LIKE $4 ESCAPE '/'
             AND svc.name = $5
             AND se.latitude BETWEEN ${minlat_param} AND ${maxlat_param}
             AND se.longitude BETWEEN ${minlon_param} AND ${maxlon_param}
             AND (ce.endtime > $6 OR ce.endtime IS NULL)
             AND (${endtime_param}::timestamptz IS NULL OR ce.starttime < ${endtime_param})
             {access_clause}"#
    );

    let mut query = sqlx::query(&sql)
        .bind(&sql_se.stream.network)
        .bind(&sql_se.stream.station)
        .bind(&sql_se.stream.channel)
        .bind(&sql_se.stream.location)
        .bind(&params.service)
        .bind(stream_epoch.starttime);
    if !access_clause.is_empty() {
        query = query.bind(params.access.clone());
    }
    let rows = query
        .bind(params.bbox.minlat)
        .bind(params.bbox.maxlat)
        .bind(params.bbox.minlon)
        .bind(params.bbox.maxlon)
        .bind(stream_epoch.endtime)
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let url: String = row.try_get(8)?;
        if let Some(methods) = &params.method {
            if !methods.iter().any(|m| url.ends_with(m.as_str())) {
                continue;
            }
        }
        out.push(JoinedRow {
            channel: row.try_get(0)?,
            locationcode: row.try_get(1)?,
            channel_start: row.try_get(2)?,
            channel_end: row.try_get(3)?,
            network: row.try_get(4)?,
            station: row.try_get(5)?,
            routing_start: row.try_get(6)?,
            routing_end: row.try_get(7)?,
            url,
        });
    }
    Ok(out)
}

/// The public entry point: `query-routes(stream_epoch, service, level,
/// access, method_filter, bbox) -> [Route]`.
pub async fn query_routes(
    pool: &PgPool,
    stream_epoch: &StreamEpoch,
    params: &QueryParams,
) -> Result<Vec<Route>, RouterError> {
    params.validate()?;

    let expanded = resolve_vnetwork(pool, stream_epoch).await?;
    let to_resolve: Vec<StreamEpoch> = if expanded.is_empty() {
        vec![stream_epoch.clone()]
    } else {
        expanded
    };

    let mut by_url: std::collections::HashMap<String, StreamEpochsHandler> = std::collections::HashMap::new();

    for se in &to_resolve {
        let rows = find_streamepochs_and_routes(pool, se, params).await?;
        for row in rows {
            let starttime = [Some(row.channel_start), Some(row.routing_start), Some(se.starttime)]
                .into_iter()
                .flatten()
                .max()
                .expect("starttime always present");
            let endtime = [row.channel_end, row.routing_end, se.endtime]
                .into_iter()
                .flatten()
                .min();

            if let Some(end) = endtime {
                if end <= starttime {
                    continue;
                }
            }

            let (sta, loc, cha) = match params.level {
                Level::Network => ("*".to_owned(), "*".to_owned(), "*".to_owned()),
                Level::Station => (row.station.clone(), "*".to_owned(), "*".to_owned()),
                Level::Channel => (row.station.clone(), row.locationcode.clone(), row.channel.clone()),
            };

            let resolved = StreamEpoch::new(Stream::new(row.network.clone(), sta, loc, cha), starttime, endtime);
            by_url
                .entry(row.url.clone())
                .or_default()
                .add(&resolved);
        }
    }

    if params.service == "station" {
        for handler in by_url.values_mut() {
            // An offset of one microsecond -- the smallest representable
            // time unit -- on boundaries the caller did not explicitly set.
            handler.canonicalize_epochs(Some(stream_epoch.starttime), stream_epoch.endtime, Duration::microseconds(1));
        }
    }

    let mut routes: Vec<Route> = Vec::with_capacity(by_url.len());
    for (url, handler) in by_url {
        let mut stream_epochs = Vec::new();
        for stream_epochs_group in handler.iter() {
            if matches!(params.level, Level::Network | Level::Station) {
                // One StreamEpoch spanning the hull of the stream's epochs,
                // no merge-explosion into per-interval pieces.
                if let (Some(start), Some(end)) = (stream_epochs_group.starttime(), stream_epochs_group.endtime()) {
                    let endtime = if is_open_end(end) { None } else { Some(end) };
                    stream_epochs.push(StreamEpoch::new(stream_epochs_group.stream.clone(), start, endtime));
                }
            } else {
                stream_epochs.extend(stream_epochs_group.iter());
            }
        }
        routes.push(Route::new(url, stream_epochs).sorted());
    }
    routes.sort_by(|a, b| a.url.cmp(&b.url));
    Ok(routes)
}
