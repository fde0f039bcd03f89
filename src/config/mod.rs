//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → PersistedConfig (validated)
//!     → ProxyConfig shared by value, backends seed the TargetPool
//!
//! On admin mutation:
//!     TargetPool (in-memory, source of truth)
//!     → store.rs serializes ProxyConfig + current target URLs
//!     → write temp file, rename over config file
//! ```
//!
//! # Design Decisions
//! - ProxyConfig is immutable once loaded
//! - Optional fields have defaults so a file with only port, strategy and frequency still loads
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;

pub use duration::GoDuration;
pub use loader::{load_config, ConfigError};
pub use schema::{BackendConfig, PersistedConfig, ProxyConfig, Strategy};
pub use store::{ConfigStore, PersistenceError};
