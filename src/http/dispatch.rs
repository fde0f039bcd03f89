//! Per-request dispatching.
//!
//! # Responsibilities
//! - Apply the request deadline
//! - Select a target with the configured strategy (single shot, no retry)
//! - Account the in-flight request on the target for the whole exchange
//! - Map failures to gateway-level responses

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Strategy;
use crate::http::forward::{guarded_body, ForwardError, Forwarder};
use crate::http::request::request_id;
use crate::load_balancer::{Target, TargetPool};
use crate::observability::metrics;

/// Routes inbound requests to pool targets.
pub struct Dispatcher {
    pool: Arc<TargetPool>,
    forwarder: Forwarder,
    strategy: Strategy,
    request_timeout: Duration,
}

impl Dispatcher {
    pub fn new(pool: Arc<TargetPool>, strategy: Strategy, request_timeout: Duration) -> Self {
        Self {
            pool,
            forwarder: Forwarder::new(),
            strategy,
            request_timeout,
        }
    }

    /// Pick a target for one request.
    pub fn select(&self) -> Result<Arc<Target>, ForwardError> {
        let algorithm = self
            .strategy
            .algorithm()
            .ok_or_else(|| ForwardError::UnsupportedStrategy(self.strategy.to_string()))?;
        self.pool
            .select(algorithm)
            .ok_or(ForwardError::NoTargetAvailable)
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let deadline = tokio::time::Instant::now() + self.request_timeout;
        let request_id = request_id(&request).to_string();
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let target = match self.select() {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(request_id = %request_id, path = %path, error = %e, "No target selected");
                metrics::record_request(method.as_str(), e.status_code().as_u16(), "none", start);
                return e.into_response();
            }
        };

        let guard = target.acquire();
        tracing::debug!(
            request_id = %request_id,
            method = %method,
            path = %path,
            target_url = %target.url(),
            "Forwarding request"
        );

        match self.forwarder.forward(&target, request, deadline).await {
            Ok(response) => {
                metrics::record_request(
                    method.as_str(),
                    response.status().as_u16(),
                    target.url(),
                    start,
                );
                let (parts, body) = response.into_parts();
                Response::from_parts(parts, guarded_body(body, guard, deadline))
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %request_id,
                    target_url = %target.url(),
                    error = %e,
                    "Upstream request failed"
                );
                metrics::record_request(method.as_str(), e.status_code().as_u16(), target.url(), start);
                e.into_response()
            }
        }
    }
}

/// Proxy handler for every path and method.
pub async fn proxy_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request<Body>,
) -> Response {
    dispatcher.dispatch(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher(strategy: Strategy, urls: &[&str]) -> Dispatcher {
        let pool = Arc::new(TargetPool::from_urls(urls.iter().copied()).unwrap());
        Dispatcher::new(pool, strategy, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_select_uses_strategy() {
        let d = dispatcher(
            Strategy::RoundRobin,
            &["http://127.0.0.1:8081", "http://127.0.0.1:8082"],
        );
        assert_eq!(d.select().unwrap().url(), "http://127.0.0.1:8081");
        assert_eq!(d.select().unwrap().url(), "http://127.0.0.1:8082");
    }

    #[tokio::test]
    async fn test_select_unsupported_strategy() {
        let d = dispatcher(Strategy::Unsupported("random".into()), &["http://127.0.0.1:8081"]);
        assert!(matches!(d.select(), Err(ForwardError::UnsupportedStrategy(s)) if s == "random"));
    }

    #[tokio::test]
    async fn test_select_empty_pool() {
        let d = dispatcher(Strategy::LeastConn, &[]);
        assert!(matches!(d.select(), Err(ForwardError::NoTargetAvailable)));
    }
}
