//! HTTP API Layer
//!
//! `POST /predict` runs the prediction tool; `GET /healthz` is the liveness
//! probe.

pub mod error;
pub mod handlers;
pub mod rate_limiter;
pub mod router;
pub mod server;
pub mod state;
pub mod types;

pub use error::ApiError;
pub use rate_limiter::{RateLimiter, MAX_BURST};
pub use router::build_router;
pub use server::{HttpServer, HttpServerConfig, ServerHandle};
pub use state::AppState;
