pub mod parse;
pub mod routing;
pub mod stationlite;
pub mod version;

mod health {
    use axum::http::StatusCode;

    pub async fn healthz() -> StatusCode {
        StatusCode::OK
    }
}

pub use health::healthz;
