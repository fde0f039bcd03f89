//! Admin interface.
//!
//! # Data Flow
//! ```text
//! GET /status      → service.rs (pool snapshot)
//! POST /backends   → service.rs (add → persist → rollback on failure)
//! DELETE /backends → service.rs (remove → persist → rollback on failure)
//! ```

pub mod handlers;
pub mod service;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use self::handlers::*;
use crate::lifecycle::shutdown::signalled;

pub use service::{AdminError, PoolAdmin, PoolStatus};

pub fn setup_admin_router(admin: Arc<PoolAdmin>) -> Router {
    Router::new()
        .route("/status", get(get_status))
        .route("/backends", post(post_backend).delete(delete_backend))
        .with_state(admin)
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin router until the shutdown signal fires.
pub async fn run_admin(
    listener: TcpListener,
    admin: Arc<PoolAdmin>,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin listener starting");

    axum::serve(listener, setup_admin_router(admin))
        .with_graceful_shutdown(signalled(shutdown))
        .await?;

    tracing::info!("Admin listener stopped");
    Ok(())
}
