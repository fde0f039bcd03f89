//! Configuration schema definitions.
//!
//! This module defines the persisted configuration file layout.
//! All types derive Serde traits; the same structure is read at startup
//! and written back by the admin interface.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::config::duration::GoDuration;
use crate::load_balancer::Algorithm;

/// Root of the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PersistedConfig {
    /// Proxy listener and behaviour settings.
    pub proxy: ProxyConfig,

    /// Upstream targets, in pool order.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

/// Proxy settings. Immutable once loaded.
///
/// Optional fields stay `None` when the file leaves them out, so persisting
/// writes back only what was there. Read them through the accessors.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy listener port (0 picks an ephemeral port).
    pub port: u16,

    /// Target selection strategy.
    pub strategy: Strategy,

    /// Period between two probe cycles.
    pub health_check_frequency: GoDuration,

    /// Bind host shared by the proxy and admin listeners.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Admin interface port (0 picks an ephemeral port).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_port: Option<u16>,

    /// Deadline applied to every proxied request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<GoDuration>,

    /// Connect timeout of a single liveness probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probe_timeout: Option<GoDuration>,

    /// Prometheus exporter bind address; disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_address: Option<String>,
}

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_ADMIN_PORT: u16 = 9000;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

impl ProxyConfig {
    /// Settings with defaults for everything but port, strategy and frequency.
    pub fn new(port: u16, strategy: Strategy, health_check_frequency: Duration) -> Self {
        Self {
            port,
            strategy,
            health_check_frequency: health_check_frequency.into(),
            host: None,
            admin_port: None,
            request_timeout: None,
            probe_timeout: None,
            metrics_address: None,
        }
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn admin_port(&self) -> u16 {
        self.admin_port.unwrap_or(DEFAULT_ADMIN_PORT)
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
            .as_ref()
            .map_or(DEFAULT_REQUEST_TIMEOUT, GoDuration::as_duration)
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
            .as_ref()
            .map_or(DEFAULT_PROBE_TIMEOUT, GoDuration::as_duration)
    }

    pub fn proxy_address(&self) -> String {
        format!("{}:{}", self.host(), self.port)
    }

    pub fn admin_address(&self) -> String {
        format!("{}:{}", self.host(), self.admin_port())
    }
}

/// One upstream entry in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: String,
}

impl From<String> for BackendConfig {
    fn from(url: String) -> Self {
        Self { url }
    }
}

/// Target selection strategy as written in the configuration file.
///
/// Unknown names are kept rather than rejected: the proxy still starts and
/// answers every request with 500 until the file is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum Strategy {
    RoundRobin,
    LeastConn,
    Unsupported(String),
}

impl Strategy {
    /// The algorithm to run, if the strategy is supported.
    pub fn algorithm(&self) -> Option<Algorithm> {
        match self {
            Strategy::RoundRobin => Some(Algorithm::RoundRobin),
            Strategy::LeastConn => Some(Algorithm::LeastConn),
            Strategy::Unsupported(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Strategy::RoundRobin => "round-robin",
            Strategy::LeastConn => "least-conn",
            Strategy::Unsupported(name) => name,
        }
    }
}

impl From<String> for Strategy {
    fn from(value: String) -> Self {
        match value.as_str() {
            "round-robin" => Strategy::RoundRobin,
            "least-conn" => Strategy::LeastConn,
            _ => Strategy::Unsupported(value),
        }
    }
}

impl From<Strategy> for String {
    fn from(value: Strategy) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
