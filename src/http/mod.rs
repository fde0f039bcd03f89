//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → dispatch.rs (deadline, strategy, target selection, accounting)
//!     → forward.rs (rewrite, send upstream, stream body back)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod forward;
pub mod request;
pub mod server;

pub use dispatch::Dispatcher;
pub use forward::{ForwardError, Forwarder};
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
