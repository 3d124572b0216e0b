use std::sync::Arc;

use crate::screening::scheduler::ScreeningContext;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The one screening context for this process. Created at startup and
    /// deactivated on shutdown.
    pub screening: Arc<ScreeningContext>,
}
