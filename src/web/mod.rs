//! HTTP interface - camera management, live streams, violation history

mod error;
mod handlers;
mod routes;

pub use error::ApiError;
pub use routes::build_router;

use std::sync::Arc;
use std::time::Instant;

use crate::supervisor::Supervisor;

/// Shared handler state
pub struct AppState {
    pub supervisor: Arc<Supervisor>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(supervisor: Arc<Supervisor>) -> Self {
        Self {
            supervisor,
            started_at: Instant::now(),
        }
    }
}
