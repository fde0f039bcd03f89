//! Active liveness probing.
//!
//! # Responsibilities
//! - Periodically probe every target
//! - Update target liveness based on results

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time;

use crate::load_balancer::{Target, TargetPool};
use crate::observability::metrics;

/// Why a probe did not reach its target.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Connect(#[from] std::io::Error),
}

/// Outcome counts of one probe cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub healthy: usize,
    pub unhealthy: usize,
}

/// Open and immediately close a TCP connection to `authority`.
pub async fn probe_tcp(authority: &str, timeout: Duration) -> Result<(), ProbeError> {
    match time::timeout(timeout, TcpStream::connect(authority)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            Ok(())
        }
        Ok(Err(e)) => Err(ProbeError::Connect(e)),
        Err(_) => Err(ProbeError::Timeout(timeout)),
    }
}

pub struct HealthProbe {
    pool: Arc<TargetPool>,
    period: Duration,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(pool: Arc<TargetPool>, period: Duration, timeout: Duration) -> Self {
        Self {
            pool,
            period,
            timeout,
        }
    }

    /// Run probe cycles until the shutdown signal fires.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            period = ?self.period,
            timeout = ?self.timeout,
            "Health probe starting"
        );

        loop {
            tokio::select! {
                report = self.run_cycle() => {
                    tracing::debug!(
                        healthy = report.healthy,
                        unhealthy = report.unhealthy,
                        "Probe cycle complete"
                    );
                }
                _ = shutdown.recv() => break,
            }

            tokio::select! {
                _ = time::sleep(self.period) => {}
                _ = shutdown.recv() => break,
            }
        }

        tracing::info!("Health probe received shutdown signal, exiting loop");
    }

    /// Probe every target once, in parallel, and record the results.
    pub async fn run_cycle(&self) -> ProbeReport {
        let targets = self.pool.targets();
        let results = join_all(targets.iter().map(|t| self.check(t))).await;

        let mut report = ProbeReport::default();
        for alive in results {
            if alive {
                report.healthy += 1;
            } else {
                report.unhealthy += 1;
            }
        }

        metrics::record_pool_size(self.pool.len(), self.pool.alive_count());
        report
    }

    async fn check(&self, target: &Arc<Target>) -> bool {
        let alive = match probe_tcp(target.authority(), self.timeout).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(target_url = %target.url(), error = %e, "Probe failed");
                false
            }
        };

        match self.pool.set_status_by_key(target.key(), alive) {
            Some(was_alive) if was_alive != alive => {
                if alive {
                    tracing::info!(target_url = %target.url(), "Target is UP");
                } else {
                    tracing::warn!(target_url = %target.url(), "Target is DOWN");
                }
            }
            Some(_) => {}
            None => tracing::debug!(target_url = %target.url(), "Target removed during probe"),
        }

        metrics::record_target_health(target.url(), alive);
        alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_probe_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(probe_tcp(&addr, Duration::from_secs(2)).await.is_ok());

        let closed = format!("127.0.0.1:{}", closed_port().await);
        assert!(matches!(
            probe_tcp(&closed, Duration::from_secs(2)).await,
            Err(ProbeError::Connect(_))
        ));
    }

    #[tokio::test]
    async fn test_cycle_updates_liveness() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let up = format!("http://{}", listener.local_addr().unwrap());
        let down = format!("http://127.0.0.1:{}", closed_port().await);

        let pool = Arc::new(TargetPool::from_urls([&up, &down]).unwrap());
        let added = pool.add_target("http://127.0.0.1:1").unwrap();
        let probe = HealthProbe::new(pool.clone(), Duration::from_secs(60), Duration::from_secs(2));

        let report = probe.run_cycle().await;
        assert_eq!(report, ProbeReport { healthy: 1, unhealthy: 2 });

        let snapshot = pool.snapshot();
        assert!(snapshot[0].alive);
        assert!(!snapshot[1].alive);
        assert!(!added.is_alive());
    }

    #[tokio::test]
    async fn test_empty_pool_cycle() {
        let probe = HealthProbe::new(
            Arc::new(TargetPool::new()),
            Duration::from_secs(60),
            Duration::from_secs(2),
        );
        assert_eq!(probe.run_cycle().await, ProbeReport::default());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let (tx, rx) = broadcast::channel(1);
        let probe = HealthProbe::new(
            Arc::new(TargetPool::new()),
            Duration::from_secs(3600),
            Duration::from_secs(2),
        );
        let handle = tokio::spawn(probe.run(rx));

        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("probe loop did not stop")
            .unwrap();
    }
}
