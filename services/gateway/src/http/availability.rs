//! `fdsnws-availability`: `/query` (granular, unsorted) and `/extent`
//! (per-stream hull, sorted by network). Grounded on
//! `eidaws.federator.fdsnws_availability.query`/`.extent`.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::http::parse::{accepts_gzip, nodata_status, parse_post_body, query_params_for_cache, stream_epochs_from_query};
use crate::http::respond::respond;
use crate::process::Format;
use crate::state::AppState;
use crate::worker::availability::validate_orderby;
use crate::worker::SimpleFormat;

const PASSTHROUGH_PARAMS: &[&str] = &["quality", "merge", "orderby", "includerestricted"];

fn extra_params(params: &HashMap<String, String>) -> HashMap<String, String> {
    params
        .iter()
        .filter(|(k, _)| PASSTHROUGH_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn query_format(params: &HashMap<String, String>) -> Format {
    match params.get("format").map(String::as_str) {
        Some("json") => Format::Simple(SimpleFormat::AvailabilityJson),
        Some("geocsv") => Format::Simple(SimpleFormat::AvailabilityGeocsv),
        _ => Format::Simple(SimpleFormat::AvailabilityText),
    }
}

fn validate(params: &HashMap<String, String>) -> Result<(), GatewayError> {
    validate_orderby(params.get("orderby").map(String::as_str))
}

/// `GET /fdsnws/availability/1/query`
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
        query_format(&params),
        "availability",
        stream_epochs,
        extra_params(&params),
        query_params_for_cache(&params),
        nodata_status(&params),
        accepts_gzip(&headers),
    )
    .await
}

/// `POST /fdsnws/availability/1/query`
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
        query_format(&params),
        "availability",
        stream_epochs,
        extra_params(&params),
        query_params_for_cache(&params),
        nodata_status(&params),
        accepts_gzip(&headers),
    )
    .await
}

/// `GET /fdsnws/availability/1/extent`
pub async fn get_extent(
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
        Format::AvailabilityExtent,
        "availability",
        stream_epochs,
        extra_params(&params),
        query_params_for_cache(&params),
        nodata_status(&params),
        accepts_gzip(&headers),
    )
    .await
}

/// `POST /fdsnws/availability/1/extent`
pub async fn post_extent(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let (params, stream_epochs) = match parse_post_body(&body) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = validate(&params) {
        return e.into_response();
    }
    respond(
        &state,
        Format::AvailabilityExtent,
        "availability",
        stream_epochs,
        extra_params(&params),
        query_params_for_cache(&params),
        nodata_status(&params),
        accepts_gzip(&headers),
    )
    .await
}
