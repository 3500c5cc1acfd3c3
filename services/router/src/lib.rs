pub mod db;
pub mod error;
pub mod http;
pub mod query;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/eidaws/routing/1/query", get(http::routing::get_query).post(http::routing::post_query))
        .route("/eidaws/routing/1/version", get(http::version::version))
        .route("/eidaws/stationlite/1/query", get(http::stationlite::get_query))
        .route("/eidaws/stationlite/1/version", get(http::version::version))
        .route("/healthz", get(http::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use eida_test_support::lazy_pg_pool;
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = build_router(AppState::new(lazy_pg_pool()));
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn routing_version_returns_ok() {
        let app = build_router(AppState::new(lazy_pg_pool()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/eidaws/routing/1/version")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
