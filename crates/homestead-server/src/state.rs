use homestead::completion::Completion;
use homestead::extract::ExtractorRegistry;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub completion: Arc<dyn Completion>,
    pub extractors: Arc<ExtractorRegistry>,
}

impl AppState {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self {
            completion,
            extractors: Arc::new(ExtractorRegistry::default()),
        }
    }
}
