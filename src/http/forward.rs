//! Upstream forwarding primitive.
//!
//! # Responsibilities
//! - Rewrite the inbound request for the selected target
//! - Strip hop-by-hop headers in both directions
//! - Send the request with the request deadline applied
//! - Keep the connection guard alive until the response body is done
//!
//! # Design Decisions
//! - The deadline is an absolute instant, shared by the request and the body
//! - Deadline before headers → 504; any other upstream failure → 502
//! - A failed forward never touches target liveness

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, StatusCode, Version};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::{IpAddr, SocketAddr};
use tokio::time::Instant;

use crate::load_balancer::{ConnectionGuard, Target};

/// Error type for request dispatching.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Service Unavailable")]
    NoTargetAvailable,

    #[error("Strategy not yet implemented: {0:?} (choose round-robin or least-conn)")]
    UnsupportedStrategy(String),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] hyper_util::client::legacy::Error),

    #[error("request deadline exceeded")]
    DeadlineExceeded,

    #[error("cannot build upstream uri: {0}")]
    InvalidUri(#[from] axum::http::Error),
}

impl ForwardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ForwardError::NoTargetAvailable => StatusCode::SERVICE_UNAVAILABLE,
            ForwardError::UnsupportedStrategy(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ForwardError::Upstream(_) | ForwardError::InvalidUri(_) => StatusCode::BAD_GATEWAY,
            ForwardError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), self.to_string()).into_response()
    }
}

static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

static HOP_BY_HOP: [HeaderName; 9] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: Option<IpAddr>) {
    let Some(ip) = client else {
        return;
    };
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR.clone(), value);
    }
}

/// HTTP client that forwards requests to targets.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new()
    }
}

impl Forwarder {
    pub fn new() -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    /// Forward `request` to `target`, giving up at `deadline`.
    pub async fn forward(
        &self,
        target: &Target,
        request: Request<Body>,
        deadline: Instant,
    ) -> Result<Response<Incoming>, ForwardError> {
        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        let (mut parts, body) = request.into_parts();
        parts.uri = target.upstream_uri(&parts.uri)?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, client_ip);

        let upstream = Request::from_parts(parts, body);
        match tokio::time::timeout_at(deadline, self.client.request(upstream)).await {
            Ok(Ok(mut response)) => {
                strip_hop_by_hop(response.headers_mut());
                Ok(response)
            }
            Ok(Err(e)) => Err(ForwardError::Upstream(e)),
            Err(_) => Err(ForwardError::DeadlineExceeded),
        }
    }
}

/// Wrap an upstream body so `guard` lives until the body is fully sent,
/// dropped by the client, or cut off by `deadline`.
pub fn guarded_body(body: Incoming, guard: ConnectionGuard, deadline: Instant) -> Body {
    let stream = Body::new(body).into_data_stream();
    let chunks = futures_util::stream::unfold(Some((stream, guard)), move |state| async move {
        let (mut stream, guard) = state?;
        match tokio::time::timeout_at(deadline, stream.next()).await {
            Ok(Some(chunk)) => Some((chunk, Some((stream, guard)))),
            Ok(None) => None,
            Err(_) => {
                tracing::warn!(
                    target_url = %guard.url(),
                    "Request deadline exceeded while streaming response body"
                );
                Some((Err(axum::Error::new(ForwardError::DeadlineExceeded)), None))
            }
        }
    });
    Body::from_stream(chunks)
}
