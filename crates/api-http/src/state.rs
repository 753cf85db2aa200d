//! Shared state handed to every handler.

use std::sync::Arc;

use cfmid_core::application::PredictionService;

use crate::rate_limiter::RateLimiter;

/// Cheap to clone; all fields are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>, rate_limiter: RateLimiter) -> Self {
        Self {
            service,
            rate_limiter: Arc::new(rate_limiter),
        }
    }
}
