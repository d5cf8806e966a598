//! Admin API module
//!
//! A small HTTP surface next to the transport: a liveness check and the
//! SSL dual mode status. It runs as a separate tokio task and uses axum for
//! HTTP handling and tower for middleware.

pub mod server;
pub mod handlers;
pub mod error;

pub use error::{AdminError, AdminResult};
pub use handlers::DualModeStatus;
pub use server::{bind_and_serve, build_router, start_admin_server, AdminState, DUAL_MODE_STATUS_PATH};
