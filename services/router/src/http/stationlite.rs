use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use eida_model::time::format_fdsn_datetime_opt;
use eida_model::StreamEpoch;
use serde::Serialize;

use crate::http::parse::{query_params_from_map, stream_epochs_from_query};
use crate::query::query_routes;
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct ChannelEpochEntry {
    network: String,
    station: String,
    location: String,
    channel: String,
    starttime: String,
    endtime: String,
    #[serde(rename = "restrictedStatus")]
    restricted_status: String,
}

/// `GET /eidaws/stationlite/1/query` -- merged channel-epoch objects as
/// JSON, independent of routing endpoints.
pub async fn get_query(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let stream_epochs = match stream_epochs_from_query(&params) {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };
    let query_params = match query_params_from_map(&params, "station") {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };
    let access = query_params.access.clone().unwrap_or_else(|| "open".to_owned());

    let mut seen: Vec<StreamEpoch> = Vec::new();
    for se in &stream_epochs {
        match query_routes(&state.pool, se, &query_params).await {
            Ok(routes) => {
                for route in routes {
                    seen.extend(route.stream_epochs);
                }
            }
            Err(e) => return e.into_response(),
        }
    }
    seen.sort();
    seen.dedup();

    if seen.is_empty() {
        return StatusCode::NO_CONTENT.into_response();
    }

    let entries: Vec<ChannelEpochEntry> = seen
        .into_iter()
        .map(|se| ChannelEpochEntry {
            network: se.stream.network,
            station: se.stream.station,
            location: se.stream.location,
            channel: se.stream.channel,
            starttime: eida_model::time::format_fdsn_datetime(se.starttime),
            endtime: format_fdsn_datetime_opt(se.endtime),
            restricted_status: access.clone(),
        })
        .collect();

    Json(entries).into_response()
}
