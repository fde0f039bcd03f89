//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Probe cycle (probe.rs):
//!     Periodic timer
//!     → Snapshot target handles from the pool
//!     → One TCP connect per target, all in parallel
//!     → Join every probe
//!     → pool.set_status_by_key(key, reachable)
//!     → Sleep until the next cycle (or stop on shutdown)
//! ```
//!
//! # Design Decisions
//! - The probe is the only writer of liveness after creation
//! - No retries inside a cycle; the next cycle is the retry
//! - Targets removed mid-cycle are ignored by the status update

pub mod probe;

pub use probe::{HealthProbe, ProbeError, ProbeReport};
