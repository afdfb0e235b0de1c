use std::sync::Arc;

use crate::services::{
    auth::TokenVerifier,
    queue::WorkQueue,
    store::{JobStore, ResultStore},
};

/// Shared application state passed to all route handlers.
///
/// Backends are constructed once at startup and injected here; handlers
/// never reach for global clients.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub results: Arc<dyn ResultStore>,
    pub queue: Arc<dyn WorkQueue>,
    pub auth: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        results: Arc<dyn ResultStore>,
        queue: Arc<dyn WorkQueue>,
        auth: TokenVerifier,
    ) -> Self {
        Self {
            jobs,
            results,
            queue,
            auth: Arc::new(auth),
        }
    }
}
