use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// The federator's error taxonomy, each variant mapped to exactly the
/// status code spec.md's error-handling table assigns it, rendered as the
/// FDSN-conformant plain-text error body.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid query parameter: {0}")]
    Parser(String),
    #[error("requested time window too large: {0}")]
    TooLarge(String),
    #[error("POST body exceeds the configured maximum size")]
    BodyTooLarge,
    #[error("no upstream byte arrived within the streaming timeout")]
    StreamingTimeout,
    #[error("routing store unreachable or returned an error: {0}")]
    RoutingFailure(String),
    #[error("distributed stream epochs not allowed for {0}")]
    DistributedStreamEpochs(String),
    #[error(transparent)]
    Model(#[from] eida_model::ModelError),
    #[error("routing client request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cache or stats backend error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl GatewayError {
    fn status(&self) -> StatusCode {
        match self {
            GatewayError::Parser(_) | GatewayError::Model(_) | GatewayError::DistributedStreamEpochs(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::TooLarge(_) | GatewayError::BodyTooLarge | GatewayError::StreamingTimeout => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            GatewayError::RoutingFailure(_) | GatewayError::Http(_) | GatewayError::Redis(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Build the fixed FDSN-conformant error body: `Error <code>: <short>`, a
/// longer description, the documentation URI, the submitted URL, the
/// submission time, and the service version.
pub fn render_error_body(code: u16, short: &str, description: &str, request_url: &str, service_version: &str) -> String {
    format!(
        "Error {code}: {short}\n\
         {description}\n\n\
         Usage details are available from https://www.fdsn.org/webservices/\n\n\
         Request:\n\
         {request_url}\n\n\
         Request Submitted:\n\
         {now}\n\n\
         Service version:\n\
         {service_version}\n",
        now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S.%6fZ"),
    )
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = render_error_body(status.as_u16(), status.canonical_reason().unwrap_or(""), &self.to_string(), "", env!("CARGO_PKG_VERSION"));
        (status, body).into_response()
    }
}
