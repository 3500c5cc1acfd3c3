//! `fdsnws-station`: GET/POST handlers. `format=xml` (the default) merges
//! StationXML DOMs at the requested `level`; `format=text` falls back to
//! the simple line-stripping worker. Grounded on
//! `eidaws.federator.fdsnws_station.xml`/`.text`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::http::parse::{accepts_gzip, nodata_status, parse_post_body, query_params_for_cache, stream_epochs_from_query};
use crate::http::respond::respond;
use crate::process::Format;
use crate::state::AppState;
use crate::worker::stationxml::MergeLevel;
use crate::worker::SimpleFormat;

fn format_for(params: &HashMap<String, String>) -> Format {
    match params.get("format").map(String::as_str) {
        Some("text") => Format::Simple(SimpleFormat::StationText),
        _ => Format::StationXml(MergeLevel::from_query_value(
            params.get("level").map(String::as_str).unwrap_or("station"),
        )),
    }
}

const PASSTHROUGH_PARAMS: &[&str] = &[
    "level",
    "format",
    "matchtimeseries",
    "includeavailability",
    "includerestricted",
    "updatedafter",
];

fn extra_params(params: &HashMap<String, String>) -> HashMap<String, String> {
    params
        .iter()
        .filter(|(k, _)| PASSTHROUGH_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn validate(params: &HashMap<String, String>) -> Result<(), GatewayError> {
    if let Some(level) = params.get("level") {
        if !["network", "station", "channel", "response"].contains(&level.as_str()) {
            return Err(GatewayError::Parser(format!("unsupported level: {level}")));
        }
    }
    Ok(())
}

/// `GET /fdsnws/station/1/query`
pub async fn get_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(e) = validate(&params) {
        return e.into_response();
    }
    let stream_epochs = match stream_epochs_from_query(&params) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    respond(
        &state,
        format_for(&params),
        "station",
        stream_epochs,
        extra_params(&params),
        query_params_for_cache(&params),
        nodata_status(&params),
        accepts_gzip(&headers),
    )
    .await
}

/// `POST /fdsnws/station/1/query`
pub async fn post_query(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let (params, stream_epochs) = match parse_post_body(&body) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = validate(&params) {
        return e.into_response();
    }
    respond(
        &state,
        format_for(&params),
        "station",
        stream_epochs,
        extra_params(&params),
        query_params_for_cache(&params),
        nodata_status(&params),
        accepts_gzip(&headers),
    )
    .await
}
