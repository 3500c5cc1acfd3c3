//! Shared FDSNWS GET/POST envelope parsing, the gateway's analog of
//! `services/router::http::parse` -- the federator surfaces accept the
//! same `net`/`sta`/`loc`/`cha`/`start`/`end` query-parameter and POST-line
//! conventions as the routing surface.

use std::collections::HashMap;

use axum::http::StatusCode;
use chrono::Utc;
use eida_model::time::parse_fdsn_datetime;
use eida_model::{Stream, StreamEpoch};

use crate::error::GatewayError;

fn csv_or_star(params: &HashMap<String, String>, keys: &[&str]) -> Vec<String> {
    for key in keys {
        if let Some(v) = params.get(*key) {
            return v.split(',').map(str::to_owned).collect();
        }
    }
    vec!["*".to_owned()]
}

/// Build the cross product of `net`/`sta`/`loc`/`cha` lists into one
/// [`StreamEpoch`] per tuple, sharing the same start/end window.
pub fn stream_epochs_from_query(params: &HashMap<String, String>) -> Result<Vec<StreamEpoch>, GatewayError> {
    let nets = csv_or_star(params, &["net", "network"]);
    let stas = csv_or_star(params, &["sta", "station"]);
    let locs = csv_or_star(params, &["loc", "location"]);
    let chas = csv_or_star(params, &["cha", "channel"]);

    let start = params
        .get("start")
        .or_else(|| params.get("starttime"))
        .map(|s| parse_fdsn_datetime(s))
        .transpose()?
        .ok_or_else(|| GatewayError::Parser("missing start".to_owned()))?;
    let end = params
        .get("end")
        .or_else(|| params.get("endtime"))
        .map(|s| parse_fdsn_datetime(s))
        .transpose()?;

    let mut out = Vec::new();
    for net in &nets {
        for sta in &stas {
            for loc in &locs {
                for cha in &chas {
                    out.push(StreamEpoch::new(Stream::new(net, sta, loc, cha), start, end));
                }
            }
        }
    }
    Ok(out)
}

/// Parse a POST body: `<key>=<value>` header lines, a blank line, then one
/// `NET STA LOC CHA START [END]` line per stream. A line missing `END`
/// defaults to the request's submission time, not an open end -- POST
/// requests are a one-shot snapshot, unlike the open-ended GET convention.
pub fn parse_post_body(body: &str) -> Result<(HashMap<String, String>, Vec<StreamEpoch>), GatewayError> {
    let mut params = HashMap::new();
    let mut stream_epochs = Vec::new();
    let default_endtime = Some(Utc::now());

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((key, value)) = trimmed.split_once('=') {
            if !key.trim().is_empty() && !key.trim().contains(' ') {
                params.insert(key.trim().to_owned(), value.trim().to_owned());
                continue;
            }
        }
        stream_epochs.push(StreamEpoch::from_post_line(trimmed, default_endtime)?);
    }
    Ok((params, stream_epochs))
}

/// The `nodata` status to report when no route (or no successful
/// sub-request) produced a body: `204` by default, `404` on request.
pub fn nodata_status(params: &HashMap<String, String>) -> u16 {
    if params.get("nodata").map(String::as_str) == Some("404") {
        StatusCode::NOT_FOUND.as_u16()
    } else {
        StatusCode::NO_CONTENT.as_u16()
    }
}

/// Every query parameter, as an order-independent list, for cache-key
/// construction (`cache::cache_key` strips `nodata`/`service` itself).
pub fn query_params_for_cache(params: &HashMap<String, String>) -> Vec<(String, String)> {
    params.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

/// Whether the client's `Accept-Encoding` header names `gzip`, so a cache
/// hit stored compressed can be passed through untouched instead of being
/// decompressed first just to be thrown away.
pub fn accepts_gzip(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(axum::http::header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').any(|enc| enc.trim().eq_ignore_ascii_case("gzip")))
        .unwrap_or(false)
}
