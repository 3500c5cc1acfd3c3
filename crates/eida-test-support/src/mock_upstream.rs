// mock_upstream: a minimal HTTP endpoint for testing gateway workers and the
// routing client without a real EIDA node or routing service.
//
// Binds to port 0 (random) and serves a single, fixed response body for
// every request it receives. Each test can spin up its own isolated
// instance.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;

struct Fixed {
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
}

/// A mock upstream HTTP server returning one fixed response for every
/// request, regardless of method or path.
pub struct MockUpstream {
    addr: SocketAddr,
    _task: tokio::task::JoinHandle<()>,
}

impl MockUpstream {
    /// Start a server that answers every request with `status`/`body`,
    /// tagged with `content_type`.
    pub async fn start(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Self {
        let fixed = Arc::new(Fixed {
            status,
            content_type,
            body: body.into(),
        });

        let app = Router::new().fallback(any(move || {
            let fixed = fixed.clone();
            async move { respond(&fixed) }
        }));

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock upstream");
        let addr = listener.local_addr().expect("local addr");

        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock upstream serve");
        });

        Self { addr, _task: task }
    }

    /// The base URL the server is listening on, e.g. `http://127.0.0.1:54321`.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

fn respond(fixed: &Fixed) -> Response {
    let mut response = (fixed.status, fixed.body.clone()).into_response();
    response.headers_mut().insert(
        HeaderName::from_static("content-type"),
        HeaderValue::from_static(fixed.content_type),
    );
    response
}
