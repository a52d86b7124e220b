//! HTTP front end
//!
//! Endpoints:
//! - POST /webhook - GitHub release deliveries
//! - GET /health - Liveness, queue size and current deployment
//! - GET /status - Current or most recent deployment record
//! - GET /metrics - Prometheus metrics (when enabled)

pub mod handlers;
pub mod responses;
pub mod server;

pub use handlers::AppState;
pub use server::start_server;
