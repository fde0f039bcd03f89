//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (durations > 0, distinct ports)
//! - Check every backend URL and reject duplicate targets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PersistedConfig → Result<(), Vec<ValidationError>>
//! - An unsupported strategy is not an error; it is reported at request time

use std::collections::HashSet;
use std::time::Duration;

use crate::config::schema::PersistedConfig;
use crate::load_balancer::{PoolError, Target};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("proxy and admin listeners both use port {0}")]
    PortConflict(u16),

    #[error("backend #{index}: {source}")]
    Backend {
        index: usize,
        #[source]
        source: PoolError,
    },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &PersistedConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let proxy = &config.proxy;

    let durations = [
        ("health_check_frequency", proxy.health_check_frequency.as_duration()),
        ("request_timeout", proxy.request_timeout()),
        ("probe_timeout", proxy.probe_timeout()),
    ];
    for (field, value) in durations {
        if value == Duration::ZERO {
            errors.push(ValidationError::ZeroDuration { field });
        }
    }

    if proxy.port != 0 && proxy.port == proxy.admin_port() {
        errors.push(ValidationError::PortConflict(proxy.port));
    }

    let mut seen = HashSet::new();
    for (index, backend) in config.backends.iter().enumerate() {
        match Target::parse(&backend.url, true) {
            Ok(target) => {
                if !seen.insert(target.key().to_string()) {
                    errors.push(ValidationError::Backend {
                        index,
                        source: PoolError::DuplicateTarget(backend.url.clone()),
                    });
                }
            }
            Err(source) => errors.push(ValidationError::Backend { index, source }),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
