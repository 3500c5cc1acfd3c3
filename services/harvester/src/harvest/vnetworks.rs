//! Harvest `<vnetwork>` elements: resolve each virtual stream pattern
//! against the real channel epochs already in the routing store, and
//! emerge a `virtual_channel_epochs` row per match.
//!
//! Grounded on `VNetHarvester._harvest_localconfig` /
//! `_emerge_virtual_channel_epoch_group` / `_emerge_virtual_channel_epoch`.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::error::HarvestError;
use crate::routing_xml::VNetworkElement;

async fn emerge_group(pool: &PgPool, code: &str) -> Result<i64, HarvestError> {
    if let Some(id) = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM virtual_channel_epoch_groups WHERE code = $1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?
    {
        return Ok(id);
    }
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO virtual_channel_epoch_groups (code) VALUES ($1) RETURNING id",
    )
    .bind(code)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

struct MatchedChannel {
    network_id: i64,
    station_id: i64,
    code: String,
    locationcode: String,
}

async fn matching_channel_epochs(
    pool: &PgPool,
    stream_epoch: &eida_model::StreamEpoch,
) -> Result<Vec<MatchedChannel>, HarvestError> {
    let sql_se = stream_epoch.to_sql_like();
    let rows = sqlx::query(
        r#"SELECT ce.network_id, ce.station_id, ce.code, ce.locationcode
           FROM channel_epochs ce
           JOIN networks n ON n.id = ce.network_id
           JOIN stations s ON s.id = ce.station_id
           WHERE n.code LIKE $1 ESCAPE '/'
             AND s.code LIKE $2 ESCAPE '/'
             AND ce.locationcode LIKE $3 ESCAPE '/'
             AND ce.code LIKE $4 ESCAPE '/'
             AND (ce.endtime IS NULL OR ce.endtime > $5)
             AND ($6::timestamptz IS NULL OR ce.starttime < $6)"#,
    )
    .bind(&sql_se.stream.network)
    .bind(&sql_se.stream.station)
    .bind(&sql_se.stream.location)
    .bind(&sql_se.stream.channel)
    .bind(stream_epoch.starttime)
    .bind(stream_epoch.endtime)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(MatchedChannel {
            network_id: row.try_get(0)?,
            station_id: row.try_get(1)?,
            code: row.try_get(2)?,
            locationcode: row.try_get(3)?,
        });
    }
    Ok(out)
}

/// Remove any existing virtual-channel-epoch rows for this (group, network,
/// station, channel, location) that overlap `[starttime, endtime)`, then
/// insert (or refresh the `lastseen` of) the row for this window.
async fn emerge_virtual_channel_epoch(
    pool: &PgPool,
    group_id: i64,
    channel: &MatchedChannel,
    starttime: DateTime<Utc>,
    endtime: Option<DateTime<Utc>>,
) -> Result<(), HarvestError> {
    let overlapping = sqlx::query(
        r#"SELECT id, starttime, endtime FROM virtual_channel_epochs
           WHERE group_id = $1 AND network_id = $2 AND station_id = $3
             AND channel = $4 AND location = $5
             AND (endtime IS NULL OR endtime > $6)
             AND ($7::timestamptz IS NULL OR starttime < $7)"#,
    )
    .bind(group_id)
    .bind(channel.network_id)
    .bind(channel.station_id)
    .bind(&channel.code)
    .bind(&channel.locationcode)
    .bind(starttime)
    .bind(endtime)
    .fetch_all(pool)
    .await?;

    let mut identical_exists = false;
    for row in &overlapping {
        let row_start: DateTime<Utc> = row.try_get(1)?;
        let row_end: Option<DateTime<Utc>> = row.try_get(2)?;
        if row_start == starttime && row_end == endtime {
            identical_exists = true;
            continue;
        }
        let id: i64 = row.try_get(0)?;
        warn!(id, "removing overlapping virtual channel epoch");
        sqlx::query("DELETE FROM virtual_channel_epochs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
    }

    if identical_exists {
        sqlx::query(
            r#"UPDATE virtual_channel_epochs SET lastseen = now()
               WHERE group_id = $1 AND network_id = $2 AND station_id = $3
                 AND channel = $4 AND location = $5 AND starttime = $6"#,
        )
        .bind(group_id)
        .bind(channel.network_id)
        .bind(channel.station_id)
        .bind(&channel.code)
        .bind(&channel.locationcode)
        .bind(starttime)
        .execute(pool)
        .await?;
    } else {
        sqlx::query(
            r#"INSERT INTO virtual_channel_epochs
                   (group_id, network_id, station_id, channel, location, starttime, endtime, lastseen)
               VALUES ($1, $2, $3, $4, $5, $6, $7, now())"#,
        )
        .bind(group_id)
        .bind(channel.network_id)
        .bind(channel.station_id)
        .bind(&channel.code)
        .bind(&channel.locationcode)
        .bind(starttime)
        .bind(endtime)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn harvest_vnetwork(pool: &PgPool, vnetwork: &VNetworkElement) -> Result<(), HarvestError> {
    let group_id = emerge_group(pool, &vnetwork.code).await?;

    for stream_epoch in &vnetwork.streams {
        let channels = matching_channel_epochs(pool, stream_epoch).await?;
        if channels.is_empty() {
            warn!(stream = %stream_epoch, "no channel epochs match virtual network stream definition");
            continue;
        }
        debug!(count = channels.len(), group = %vnetwork.code, "resolved virtual channel epochs");
        for channel in &channels {
            emerge_virtual_channel_epoch(pool, group_id, channel, stream_epoch.starttime, stream_epoch.endtime)
                .await?;
        }
    }

    Ok(())
}
