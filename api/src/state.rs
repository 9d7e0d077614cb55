use std::sync::Arc;

use crate::gateway::ModelBackend;

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn ModelBackend>,
}

impl AppState {
    pub fn new(backend: impl ModelBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}
