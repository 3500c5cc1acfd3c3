use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the routing-store query engine and its HTTP surface.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("invalid service: {0}")]
    InvalidService(String),
    #[error("invalid spatial constraints: min >= max")]
    InvalidBbox,
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Model(#[from] eida_model::ModelError),
}

impl IntoResponse for RouterError {
    fn into_response(self) -> Response {
        let status = match &self {
            RouterError::InvalidService(_) | RouterError::InvalidBbox | RouterError::MalformedBody(_) => {
                StatusCode::BAD_REQUEST
            }
            RouterError::Model(_) => StatusCode::BAD_REQUEST,
            RouterError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
