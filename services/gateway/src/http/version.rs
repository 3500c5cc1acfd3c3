use axum::response::IntoResponse;

use crate::state::SERVICE_VERSION;

/// `GET /fdsnws/<surface>/1/version` and `/eidaws/wfcatalog/1/version`.
pub async fn version() -> impl IntoResponse {
    ([("content-type", "text/plain; charset=utf-8")], SERVICE_VERSION)
}
