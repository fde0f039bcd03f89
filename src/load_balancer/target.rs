//! Upstream target abstraction.
//!
//! # Responsibilities
//! - Represent a single upstream endpoint
//! - Track in-flight requests (for Least Connections LB)
//! - Hold the liveness flag written by the health probe

use axum::http::uri::{PathAndQuery, Scheme, Uri};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

use crate::load_balancer::pool::PoolError;

/// A single upstream target.
#[derive(Debug)]
pub struct Target {
    /// URL exactly as configured, used for reporting and persistence.
    url: String,
    /// Canonical `scheme://host:port`, the identity of the target.
    key: String,
    /// `host:port` used for dialing.
    authority: String,
    /// Path prefix requests are forwarded under (no trailing slash).
    base_path: String,
    /// Query string carried by the target URL itself.
    base_query: Option<String>,

    alive: AtomicBool,
    connections: AtomicUsize,
}

impl Target {
    /// Parse a target from its configured URL.
    pub fn parse(url: &str, alive: bool) -> Result<Self, PoolError> {
        let invalid = |reason: &str| PoolError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        if parsed.scheme() != "http" {
            return Err(invalid("only http targets are supported"));
        }
        let host = match parsed.host_str() {
            Some(h) if !h.is_empty() => h,
            _ => return Err(invalid("missing host")),
        };
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| invalid("missing port"))?;

        let authority = format!("{}:{}", host, port);
        let key = format!("{}://{}", parsed.scheme(), authority);
        let base_path = parsed.path().trim_end_matches('/').to_string();

        Ok(Self {
            url: url.to_string(),
            key,
            authority,
            base_path,
            base_query: parsed.query().map(str::to_string),
            alive: AtomicBool::new(alive),
            connections: AtomicUsize::new(0),
        })
    }

    /// Configured URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Canonical identity (`scheme://host:port`).
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Dial address (`host:port`).
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Store a new liveness value, returning the previous one.
    pub(crate) fn set_alive(&self, alive: bool) -> bool {
        self.alive.swap(alive, Ordering::AcqRel)
    }

    /// Number of in-flight requests.
    pub fn current_connections(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    pub(crate) fn inc_connections(&self) {
        self.connections.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement the in-flight count. Never wraps below zero.
    pub(crate) fn dec_connections(&self) {
        let result = self
            .connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if result.is_err() {
            tracing::error!(target_url = %self.url, "Connection counter decremented below zero");
        }
    }

    /// Account one in-flight request until the returned guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.inc_connections();
        ConnectionGuard {
            target: self.clone(),
        }
    }

    /// Build the upstream URI for an inbound request URI.
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, axum::http::Error> {
        let path = join_paths(&self.base_path, inbound.path());
        let query = match (self.base_query.as_deref(), inbound.query()) {
            (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some(format!("{}&{}", a, b)),
            (Some(a), _) if !a.is_empty() => Some(a.to_string()),
            (_, Some(b)) if !b.is_empty() => Some(b.to_string()),
            _ => None,
        };
        let path_and_query = match query {
            Some(q) => format!("{}?{}", path, q),
            None => path,
        };

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.as_str())
            .path_and_query(PathAndQuery::try_from(path_and_query)?)
            .build()
    }
}

fn join_paths(base: &str, path: &str) -> String {
    if base.is_empty() {
        if path.is_empty() {
            return "/".to_string();
        }
        return path.to_string();
    }
    match path.strip_prefix('/') {
        Some(rest) => format!("{}/{}", base, rest),
        None => format!("{}/{}", base, path),
    }
}

/// A RAII guard that manages the in-flight request count.
#[derive(Debug)]
pub struct ConnectionGuard {
    target: Arc<Target>,
}

impl Deref for ConnectionGuard {
    type Target = Target;
    fn deref(&self) -> &Self::Target {
        &self.target
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.target.dec_connections();
    }
}
