//! mimir-testkit - recording mock of Mimir's HTTP API
//!
//! [`MockMimir`] serves an axum router on an ephemeral local port. Every
//! request is recorded and answered by a test-supplied responder, so tests
//! can assert on the exact method, path, content type and body a client
//! sent.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use parking_lot::Mutex;
use tokio::net::TcpListener;

/// One request as the mock received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    /// HTTP method, e.g. `POST`.
    pub method: String,
    /// Request path without the query string.
    pub path: String,
    /// `Content-Type` header, if sent.
    pub content_type: Option<String>,
    /// Request body.
    pub body: String,
}

type Responder = dyn Fn(&Recorded) -> (u16, String) + Send + Sync;

struct MockState {
    requests: Mutex<Vec<Recorded>>,
    responder: Box<Responder>,
    silent: bool,
}

/// A running mock Mimir server.
pub struct MockMimir {
    addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockMimir {
    /// Starts a server that answers every request with `responder`'s
    /// status code and body.
    pub async fn start(
        responder: impl Fn(&Recorded) -> (u16, String) + Send + Sync + 'static,
    ) -> std::io::Result<Self> {
        Self::serve(Box::new(responder), false).await
    }

    /// Starts a server that records requests but never answers them.
    pub async fn silent() -> std::io::Result<Self> {
        Self::serve(Box::new(|_| (200, String::new())), true).await
    }

    async fn serve(responder: Box<Responder>, silent: bool) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(MockState {
            requests: Mutex::new(Vec::new()),
            responder,
            silent,
        });

        let router = Router::new()
            .fallback(record)
            .with_state(Arc::clone(&state));
        tokio::spawn(async move { axum::serve(listener, router).await });

        Ok(Self { addr, state })
    }

    /// Base URL of the server.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().clone()
    }
}

async fn record(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, String) {
    let recorded = Recorded {
        method: method.to_string(),
        path: uri.path().to_string(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    };
    state.requests.lock().push(recorded.clone());

    if state.silent {
        std::future::pending::<()>().await;
    }

    let (code, body) = (state.responder)(&recorded);
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, body)
}

/// URL of a local port with nothing listening on it.
pub async fn closed_port_url() -> std::io::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}
