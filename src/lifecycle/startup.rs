//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Build the target pool
//! - Start background tasks (health probe, metrics exporter)
//! - Bind listeners and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: configuration and bind errors are fatal
//! - Listeners start last (traffic only when ready)
//! - The first probe cycle runs immediately, concurrently with listener startup

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, PoolAdmin};
use crate::config::{load_config, ConfigError, ConfigStore, PersistedConfig};
use crate::health::HealthProbe;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::load_balancer::{PoolError, TargetPool};
use crate::observability::metrics;

/// Error type for startup failures.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot build target pool: {0}")]
    Pool(#[from] PoolError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Handles to a started proxy.
pub struct Running {
    pub proxy_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub pool: Arc<TargetPool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Running {
    /// Wait for every background task to finish (after shutdown is triggered).
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Background task panicked");
            }
        }
    }
}

/// Load the configuration file at `path` and start the proxy.
pub async fn launch(path: &Path, shutdown: &Shutdown) -> Result<Running, StartupError> {
    let config = load_config(path)?;
    tracing::info!(
        path = %path.display(),
        port = config.proxy.port,
        strategy = %config.proxy.strategy,
        backends = config.backends.len(),
        "Configuration loaded"
    );
    start(config, path, shutdown).await
}

async fn bind(address: String) -> Result<TcpListener, StartupError> {
    TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })
}

/// Start the proxy from an already-validated configuration.
///
/// `path` is where admin mutations are persisted.
pub async fn start(
    config: PersistedConfig,
    path: &Path,
    shutdown: &Shutdown,
) -> Result<Running, StartupError> {
    let proxy = config.proxy;

    if proxy.strategy.algorithm().is_none() {
        tracing::warn!(
            strategy = %proxy.strategy,
            "Unsupported strategy, every proxied request will fail with 500"
        );
    }

    let pool = Arc::new(TargetPool::from_urls(
        config.backends.iter().map(|b| b.url.as_str()),
    )?);
    metrics::record_pool_size(pool.len(), pool.alive_count());

    if let Some(address) = proxy.metrics_address.as_deref() {
        match address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::warn!(address = %address, error = %e, "Metrics exporter disabled");
                }
            }
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Invalid metrics address");
            }
        }
    }

    let proxy_listener = bind(proxy.proxy_address()).await?;
    let admin_listener = bind(proxy.admin_address()).await?;
    let proxy_addr = local_addr(&proxy_listener, proxy.proxy_address())?;
    let admin_addr = local_addr(&admin_listener, proxy.admin_address())?;

    let mut tasks = Vec::with_capacity(3);

    let probe = HealthProbe::new(
        pool.clone(),
        proxy.health_check_frequency.as_duration(),
        proxy.probe_timeout(),
    );
    tasks.push(tokio::spawn(probe.run(shutdown.subscribe())));

    let server = HttpServer::new(&proxy, pool.clone());
    let proxy_shutdown = shutdown.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = server.run(proxy_listener, proxy_shutdown).await {
            tracing::error!(error = %e, "Proxy listener failed");
        }
    }));

    let store = ConfigStore::new(path, proxy);
    let pool_admin = Arc::new(PoolAdmin::new(pool.clone(), store));
    let admin_shutdown = shutdown.subscribe();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = admin::run_admin(admin_listener, pool_admin, admin_shutdown).await {
            tracing::error!(error = %e, "Admin listener failed");
        }
    }));

    tracing::info!(
        proxy = %proxy_addr,
        admin = %admin_addr,
        targets = pool.len(),
        "Load balancer started"
    );

    Ok(Running {
        proxy_addr,
        admin_addr,
        pool,
        tasks,
    })
}

fn local_addr(listener: &TcpListener, address: String) -> Result<SocketAddr, StartupError> {
    listener
        .local_addr()
        .map_err(|source| StartupError::Bind { address, source })
}
