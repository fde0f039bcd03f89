//! Reverse-proxy load balancer library.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::{PersistedConfig, ProxyConfig, Strategy};
pub use http::HttpServer;
pub use lifecycle::{launch, Running, Shutdown, StartupError};
pub use load_balancer::{Target, TargetPool};
