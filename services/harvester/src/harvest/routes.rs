//! Harvest `<route>` elements: fetch each route's FDSNWS station inventory,
//! emerge `Network`/`Station`/`ChannelEpoch` rows, then emerge `Service`/
//! `Endpoint`/`Routing` rows for every service child with `priority == 1`.
//!
//! Grounded on `RoutingHarvester._harvest_localconfig` /
//! `_harvest_from_stationxml` / `_configure_routings` /
//! `_emerge_network_epoch` / `_emerge_station_epoch` / `_emerge_channel_epoch`
//! / `_emerge_service` / `_emerge_endpoint` / `_emerge_routing`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::error::HarvestError;
use crate::fetch::fetch_station_inventory;
use crate::routing_xml::RouteElement;
use crate::stationxml::{parse_station_inventory, ChannelEpochXml};

/// Rewrite a `dataselect`/`availability` endpoint URL to the method token(s)
/// appropriate for `restricted_status`, the way `force_restricted` routing
/// does in the upstream node configuration. Non-restricted services are
/// passed through unchanged.
fn autocorrect_url(url: &str, service_tag: &str, restricted_status: &str) -> Vec<String> {
    if service_tag != "dataselect" && service_tag != "availability" {
        return vec![url.to_owned()];
    }

    let base = url.trim_end_matches('/');
    let (base, existing) = strip_known_token(base);

    let mut tokens: Vec<&str> = Vec::new();
    match restricted_status {
        "open" => {
            tokens.push("query");
            if service_tag == "availability" {
                match existing {
                    None => tokens.push("extent"),
                    Some("extent") => tokens = vec!["extent"],
                    _ => {}
                }
            }
        }
        "closed" => {
            tokens.push("queryauth");
            if service_tag == "availability" {
                match existing {
                    None => tokens.push("extentauth"),
                    Some("extent") | Some("extentauth") => tokens = vec!["extentauth"],
                    _ => {}
                }
            }
        }
        _ => return Vec::new(),
    }

    tokens.into_iter().map(|t| format!("{base}/{t}")).collect()
}

fn strip_known_token(url: &str) -> (&str, Option<&str>) {
    for token in ["queryauth", "extentauth", "query", "extent"] {
        if let Some(base) = url.strip_suffix(token) {
            if let Some(base) = base.strip_suffix('/') {
                return (base, Some(token));
            }
        }
    }
    (url, None)
}

async fn emerge_network(pool: &PgPool, code: &str) -> Result<i64, HarvestError> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM networks WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO networks (code) VALUES ($1) ON CONFLICT (code) DO UPDATE SET code = EXCLUDED.code RETURNING id",
    )
    .bind(code)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn emerge_station(pool: &PgPool, code: &str) -> Result<i64, HarvestError> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM stations WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }
    let id: i64 = sqlx::query_scalar("INSERT INTO stations (code) VALUES ($1) RETURNING id")
        .bind(code)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

#[allow(clippy::too_many_arguments)]
async fn emerge_station_epoch(
    pool: &PgPool,
    station_id: i64,
    network_id: i64,
    description: &str,
    latitude: f64,
    longitude: f64,
    starttime: DateTime<Utc>,
    endtime: Option<DateTime<Utc>>,
) -> Result<(), HarvestError> {
    let updated = sqlx::query(
        r#"UPDATE station_epochs
           SET description = $3, latitude = $4, longitude = $5, endtime = $6
           WHERE station_id = $1 AND network_id = $2 AND starttime = $7"#,
    )
    .bind(station_id)
    .bind(network_id)
    .bind(description)
    .bind(latitude)
    .bind(longitude)
    .bind(endtime)
    .bind(starttime)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            r#"INSERT INTO station_epochs
                   (station_id, network_id, description, latitude, longitude, starttime, endtime)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(station_id)
        .bind(network_id)
        .bind(description)
        .bind(latitude)
        .bind(longitude)
        .bind(starttime)
        .bind(endtime)
        .execute(pool)
        .await?;
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn emerge_channel_epoch(
    pool: &PgPool,
    network_id: i64,
    station_id: i64,
    code: &str,
    locationcode: &str,
    restrictedstatus: &str,
    starttime: DateTime<Utc>,
    endtime: Option<DateTime<Utc>>,
) -> Result<i64, HarvestError> {
    if let Some(id) = sqlx::query_scalar::<_, i64>(
        r#"SELECT id FROM channel_epochs
           WHERE network_id = $1 AND station_id = $2 AND code = $3
             AND locationcode = $4 AND starttime = $5"#,
    )
    .bind(network_id)
    .bind(station_id)
    .bind(code)
    .bind(locationcode)
    .bind(starttime)
    .fetch_optional(pool)
    .await?
    {
        sqlx::query(
            "UPDATE channel_epochs SET restrictedstatus = $2::restricted_status, endtime = $3, lastseen = now() WHERE id = $1",
        )
        .bind(id)
        .bind(restrictedstatus)
        .bind(endtime)
        .execute(pool)
        .await?;
        return Ok(id);
    }

    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO channel_epochs
               (network_id, station_id, code, locationcode, restrictedstatus, starttime, endtime, lastseen)
           VALUES ($1, $2, $3, $4, $5::restricted_status, $6, $7, now())
           RETURNING id"#,
    )
    .bind(network_id)
    .bind(station_id)
    .bind(code)
    .bind(locationcode)
    .bind(restrictedstatus)
    .bind(starttime)
    .bind(endtime)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn emerge_service(pool: &PgPool, name: &str) -> Result<i64, HarvestError> {
    if let Some(id) = sqlx::query_scalar::<_, i64>("SELECT id FROM services WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await?
    {
        return Ok(id);
    }
    let id: i64 = sqlx::query_scalar("INSERT INTO services (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

async fn emerge_endpoint(pool: &PgPool, service_id: i64, url: &str) -> Result<i64, HarvestError> {
    if let Some(id) = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM endpoints WHERE service_id = $1 AND url = $2",
    )
    .bind(service_id)
    .bind(url)
    .fetch_optional(pool)
    .await?
    {
        return Ok(id);
    }
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO endpoints (service_id, url) VALUES ($1, $2) RETURNING id",
    )
    .bind(service_id)
    .bind(url)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn emerge_routing(
    pool: &PgPool,
    channel_epoch_id: i64,
    endpoint_id: i64,
    starttime: DateTime<Utc>,
    endtime: Option<DateTime<Utc>>,
) -> Result<(), HarvestError> {
    let updated = sqlx::query(
        r#"UPDATE routings SET endtime = $4, lastseen = now()
           WHERE channel_epoch_id = $1 AND endpoint_id = $2 AND starttime = $3"#,
    )
    .bind(channel_epoch_id)
    .bind(endpoint_id)
    .bind(starttime)
    .bind(endtime)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        sqlx::query(
            r#"INSERT INTO routings (channel_epoch_id, endpoint_id, starttime, endtime, lastseen)
               VALUES ($1, $2, $3, $4, now())"#,
        )
        .bind(channel_epoch_id)
        .bind(endpoint_id)
        .bind(starttime)
        .bind(endtime)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Harvest one `<route>` element: resolve its station-service inventory,
/// emerge network/station/channel epochs, then attach a routing row per
/// configured service/endpoint for each channel.
pub async fn harvest_route(
    pool: &PgPool,
    client: &reqwest::Client,
    route: &RouteElement,
    force_restricted: bool,
) -> Result<(), HarvestError> {
    let station_service = route.services.iter().find(|s| s.name == "station");
    let Some(station_service) = station_service else {
        debug!(stream = %route.stream, "route has no station service, skipping");
        return Ok(());
    };

    let query = format!(
        "net={}&sta={}&loc={}&cha={}&level=channel",
        route.stream.network, route.stream.station, route.stream.location, route.stream.channel
    );
    let separator = if station_service.url.contains('?') { "&" } else { "?" };
    let inventory_url = format!("{}{separator}{query}", station_service.url);

    let body = fetch_station_inventory(client, &inventory_url).await?;
    let networks = parse_station_inventory(&body)?;
    if networks.is_empty() {
        debug!(url = %inventory_url, "empty station inventory response");
        return Ok(());
    }

    for network in &networks {
        let network_id = emerge_network(pool, &network.code).await?;
        for station in &network.stations {
            let station_id = emerge_station(pool, &station.code).await?;
            emerge_station_epoch(
                pool,
                station_id,
                network_id,
                "",
                station.latitude,
                station.longitude,
                station.start,
                station.end,
            )
            .await?;

            let mut channel_ids: Vec<(i64, &ChannelEpochXml)> = Vec::with_capacity(station.channels.len());
            for channel in &station.channels {
                let channel_epoch_id = emerge_channel_epoch(
                    pool,
                    network_id,
                    station_id,
                    &channel.code,
                    &channel.locationcode,
                    &channel.restricted_status,
                    channel.start,
                    channel.end,
                )
                .await?;
                channel_ids.push((channel_epoch_id, channel));
            }

            for service_element in &route.services {
                if service_element.priority != 1 {
                    debug!(service = %service_element.name, priority = service_element.priority, "skipping non-primary priority");
                    continue;
                }

                let service_id = emerge_service(pool, &service_element.name).await?;

                for (channel_epoch_id, channel) in &channel_ids {
                    if matches!(service_element.name.as_str(), "dataselect" | "availability")
                        && !matches!(channel.restricted_status.as_str(), "open" | "closed")
                    {
                        warn!(
                            channel = %channel.code,
                            restricted_status = %channel.restricted_status,
                            service = %service_element.name,
                            "cannot route this restricted status through a dataselect/availability endpoint"
                        );
                        continue;
                    }

                    let urls = if force_restricted {
                        autocorrect_url(&service_element.url, &service_element.name, &channel.restricted_status)
                    } else {
                        vec![service_element.url.clone()]
                    };

                    for url in urls {
                        let endpoint_id = emerge_endpoint(pool, service_id, &url).await?;
                        emerge_routing(pool, *channel_epoch_id, endpoint_id, service_element.start, service_element.end)
                            .await?;
                    }
                }
            }
        }
    }

    Ok(())
}
