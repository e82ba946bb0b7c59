//! HTTP transport for the bot
//!
//! Join, leave and message endpoints drive the per-user runtimes; replies
//! come back in the response body and, paced, on the user's SSE stream.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::ProductionRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ProductionRuntime>,
}

impl AppState {
    pub fn new(runtime: ProductionRuntime) -> Self {
        Self {
            runtime: Arc::new(runtime),
        }
    }
}
