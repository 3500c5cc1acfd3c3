pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod pool;
pub mod process;
pub mod routing_client;
pub mod state;
pub mod stats;
pub mod worker;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/fdsnws/dataselect/1/query", get(http::dataselect::get_query).post(http::dataselect::post_query))
        .route("/fdsnws/dataselect/1/version", get(http::version::version))
        .route("/fdsnws/station/1/query", get(http::station::get_query).post(http::station::post_query))
        .route("/fdsnws/station/1/version", get(http::version::version))
        .route("/fdsnws/availability/1/query", get(http::availability::get_query).post(http::availability::post_query))
        .route("/fdsnws/availability/1/extent", get(http::availability::get_extent).post(http::availability::post_extent))
        .route("/fdsnws/availability/1/version", get(http::version::version))
        .route("/eidaws/wfcatalog/1/query", get(http::wfcatalog::get_query).post(http::wfcatalog::post_query))
        .route("/eidaws/wfcatalog/1/version", get(http::version::version))
        .route("/healthz", get(http::healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(crate::config::Config::from_env())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn dataselect_version_returns_ok() {
        let app = build_router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/fdsnws/dataselect/1/version")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
