use actions_core::ActionRouter;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ActionRouter>,
}

impl AppState {
    pub fn new(router: Arc<ActionRouter>) -> Self {
        Self { router }
    }
}
