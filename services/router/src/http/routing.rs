use std::collections::HashMap;
use std::fmt::Write as _;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use eida_model::{Route, StreamEpoch};

use crate::error::RouterError;
use crate::http::parse::{parse_post_body, query_params_from_map, stream_epochs_from_query};
use crate::query::query_routes;
use crate::state::AppState;

/// `GET /eidaws/routing/1/query` -- one stream-epoch's worth of codes via
/// query parameters.
pub async fn get_query(State(state): State<AppState>, Query(params): Query<HashMap<String, String>>) -> Response {
    let service = params.get("service").cloned().unwrap_or_else(|| "dataselect".to_owned());
    respond(&state, &params, &service, stream_epochs_from_query(&params)).await
}

/// `POST /eidaws/routing/1/query` -- header lines plus `NET STA LOC CHA
/// START [END]` body lines.
pub async fn post_query(State(state): State<AppState>, body: String) -> Response {
    match parse_post_body(&body) {
        Ok((params, ses)) => {
            let service = params.get("service").cloned().unwrap_or_else(|| "dataselect".to_owned());
            respond(&state, &params, &service, Ok(ses)).await
        }
        Err(e) => e.into_response(),
    }
}

async fn respond(
    state: &AppState,
    params: &HashMap<String, String>,
    service: &str,
    ses: Result<Vec<StreamEpoch>, RouterError>,
) -> Response {
    let stream_epochs = match ses {
        Ok(v) => v,
        Err(e) => return e.into_response(),
    };

    let query_params = match query_params_from_map(params, service) {
        Ok(p) => p,
        Err(e) => return e.into_response(),
    };

    let mut merged: HashMap<String, Vec<StreamEpoch>> = HashMap::new();
    for se in &stream_epochs {
        let routes = match query_routes(&state.pool, se, &query_params).await {
            Ok(r) => r,
            Err(e) => return e.into_response(),
        };
        for route in routes {
            merged.entry(route.url).or_default().extend(route.stream_epochs);
        }
    }

    let mut routes: Vec<Route> = merged
        .into_iter()
        .map(|(url, mut stream_epochs)| {
            stream_epochs.sort();
            Route::new(url, stream_epochs)
        })
        .collect();
    routes.sort_by(|a, b| a.url.cmp(&b.url));

    if routes.is_empty() {
        let status = if params.get("nodata").map(String::as_str) == Some("404") {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::NO_CONTENT
        };
        return status.into_response();
    }

    (StatusCode::OK, [("content-type", "text/plain; charset=utf-8")], render_blocks(&routes)).into_response()
}

/// `<url>\nNET STA LOC CHA START END\n...\n\n<url>\n...`, blank-line
/// separated blocks.
fn render_blocks(routes: &[Route]) -> String {
    let mut out = String::new();
    for (i, route) in routes.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "{}", route.url);
        for se in &route.stream_epochs {
            let _ = writeln!(out, "{se}");
        }
    }
    out
}
