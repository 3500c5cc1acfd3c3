pub mod availability;
pub mod dataselect;
pub mod parse;
pub mod respond;
pub mod station;
pub mod version;
pub mod wfcatalog;

mod health {
    use axum::http::StatusCode;

    pub async fn healthz() -> StatusCode {
        StatusCode::OK
    }
}

pub use health::healthz;
