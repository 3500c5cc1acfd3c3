//! Shared request-processor invocation: build a `ProcessRequest`, run it,
//! and translate the outcome into an axum `Response`. Every FDSNWS surface
//! handler bottoms out here, mirroring `services/router::http::routing`'s
//! shared `respond` helper.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use eida_model::StreamEpoch;

use crate::process::{process, Format, ProcessRequest};
use crate::state::AppState;

#[allow(clippy::too_many_arguments)]
pub async fn respond(
    state: &AppState,
    format: Format,
    service: &'static str,
    stream_epochs: Vec<StreamEpoch>,
    extra_params: HashMap<String, String>,
    query_params_for_cache: Vec<(String, String)>,
    nodata_status: u16,
    accept_gzip: bool,
) -> Response {
    let ctx = state.processor_context();
    let req = ProcessRequest {
        service,
        format,
        stream_epochs,
        extra_params,
        query_params_for_cache,
        nodata_status,
        accept_gzip,
    };

    match process(&ctx, req).await {
        Ok(resp) => {
            let mut builder = Response::builder().status(resp.status).header("content-type", resp.content_type);
            if let Some(disposition) = &resp.content_disposition {
                builder = builder.header("content-disposition", disposition.as_str());
            }
            if resp.gzip_encoded {
                builder = builder.header("content-encoding", "gzip");
            }
            builder
                .body(Body::from(resp.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => e.into_response(),
    }
}
