//! Shared FDSNWS GET/POST envelope parsing for the routing and stationlite
//! surfaces, in the style of the original's `RequestHandlerBase`.

use std::collections::HashMap;

use eida_model::time::parse_fdsn_datetime;
use eida_model::{Stream, StreamEpoch};

use crate::error::RouterError;
use crate::query::{BoundingBox, Level, QueryParams};

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
pub fn stream_epochs_from_query(params: &HashMap<String, String>) -> Result<Vec<StreamEpoch>, RouterError> {
    let nets = csv_or_star(params, &["net", "network"]);
    let stas = csv_or_star(params, &["sta", "station"]);
    let locs = csv_or_star(params, &["loc", "location"]);
    let chas = csv_or_star(params, &["cha", "channel"]);

    let start = params
        .get("start")
        .or_else(|| params.get("starttime"))
        .map(|s| parse_fdsn_datetime(s))
        .transpose()?
        .ok_or_else(|| RouterError::MalformedBody("missing start".to_owned()))?;
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
                    out.push(StreamEpoch::new(
                        Stream::new(net, sta, loc, cha),
                        start,
                        end,
                    ));
                }
            }
        }
    }
    Ok(out)
}

/// Parse a POST body: `<key>=<value>` header lines, a blank line, then one
/// `NET STA LOC CHA START [END]` line per stream.
pub fn parse_post_body(body: &str) -> Result<(HashMap<String, String>, Vec<StreamEpoch>), RouterError> {
    let mut params = HashMap::new();
    let mut stream_epochs = Vec::new();

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
        let se = StreamEpoch::from_post_line(trimmed, None)?;
        stream_epochs.push(se);
    }
    Ok((params, stream_epochs))
}

pub fn query_params_from_map(params: &HashMap<String, String>, service: &str) -> Result<QueryParams, RouterError> {
    let level = Level::parse(params.get("level").map(String::as_str).unwrap_or("channel"));
    let access = params.get("access").cloned();
    let method = params.get("method").map(|m| m.split(',').map(str::to_owned).collect());

    let bbox = BoundingBox {
        minlat: parse_f64_or(params, "minlat", -90.0)?,
        maxlat: parse_f64_or(params, "maxlat", 90.0)?,
        minlon: parse_f64_or(params, "minlon", -180.0)?,
        maxlon: parse_f64_or(params, "maxlon", 180.0)?,
    };

    Ok(QueryParams {
        service: service.to_owned(),
        level,
        access,
        method,
        bbox,
    })
}

fn parse_f64_or(params: &HashMap<String, String>, key: &str, default: f64) -> Result<f64, RouterError> {
    match params.get(key) {
        Some(v) => v
            .parse()
            .map_err(|_| RouterError::MalformedBody(format!("invalid {key}"))),
        None => Ok(default),
    }
}
