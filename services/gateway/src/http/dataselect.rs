//! `fdsnws-dataselect`: GET/POST handlers producing merged MiniSEED.
//! Grounded on `eidaws.federator.fdsnws_dataselect.miniseed` and
//! `services/router::http::routing`'s GET/POST handler pairing.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::http::parse::{accepts_gzip, nodata_status, parse_post_body, query_params_for_cache, stream_epochs_from_query};
use crate::http::respond::respond;
use crate::process::Format;
use crate::state::AppState;

const PASSTHROUGH_PARAMS: &[&str] = &["quality", "minimumlength", "longestonly"];

fn extra_params(params: &HashMap<String, String>) -> HashMap<String, String> {
    params
        .iter()
        .filter(|(k, _)| PASSTHROUGH_PARAMS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// `GET /fdsnws/dataselect/1/query`
pub async fn get_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let stream_epochs = match stream_epochs_from_query(&params) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    respond(
        &state,
        Format::MiniSeed,
        "dataselect",
        stream_epochs,
        extra_params(&params),
        query_params_for_cache(&params),
        nodata_status(&params),
        accepts_gzip(&headers),
    )
    .await
}

/// `POST /fdsnws/dataselect/1/query`
pub async fn post_query(State(state): State<AppState>, headers: HeaderMap, body: String) -> Response {
    let (params, stream_epochs) = match parse_post_body(&body) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    respond(
        &state,
        Format::MiniSeed,
        "dataselect",
        stream_epochs,
        extra_params(&params),
        query_params_for_cache(&params),
        nodata_status(&params),
        accepts_gzip(&headers),
    )
    .await
}
