use std::collections::HashMap;
use std::sync::Arc;

use super::provider::CompletionProvider;
use crate::errors::ApiError;

/// Routes model ids to provider instances through an explicit table.
///
/// Dispatch is data, not name matching: an id either has a registered
/// provider or the call fails with `UnsupportedModel` before any
/// embedding or storage work happens.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` for `model_id`, replacing any previous entry.
    pub fn register(&mut self, model_id: impl Into<String>, provider: Arc<dyn CompletionProvider>) {
        self.providers.insert(model_id.into(), provider);
    }

    pub fn resolve(&self, model_id: &str) -> Result<Arc<dyn CompletionProvider>, ApiError> {
        self.providers
            .get(model_id)
            .cloned()
            .ok_or_else(|| ApiError::UnsupportedModel(model_id.to_string()))
    }

    pub fn model_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }
}
