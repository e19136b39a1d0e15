//! Backend registry mapping backend identifiers to adapters

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::anthropic::AnthropicBackend;
use crate::backend::fallback::AlternationFallback;
use crate::backend::openai::OpenAiBackend;
use crate::backend::traits::BackendAdapter;
use crate::config::{BackendConfig, BackendsConfig};
use crate::error::Result;
use crate::relay::message::BackendId;

/// Registry of the adapters the dispatcher may call
pub struct BackendRegistry {
    backends: DashMap<BackendId, Arc<dyn BackendAdapter>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: DashMap::new(),
        }
    }

    /// Register every enabled backend from configuration
    pub fn initialize_from_config(&self, config: &BackendsConfig) -> Result<()> {
        for (id, backend_config) in config.enabled() {
            if backend_config.resolve_api_key().is_none() {
                warn!(backend = %id, "No API key configured, requests will likely be rejected");
            }
            let adapter = create_adapter(id, backend_config)?;
            self.register(adapter);
        }
        Ok(())
    }

    /// Register an adapter under the backend it speaks for, replacing any previous one
    pub fn register(&self, adapter: Arc<dyn BackendAdapter>) {
        let id = adapter.backend();
        if self.backends.insert(id, adapter).is_some() {
            warn!(backend = %id, "Replaced existing backend adapter");
        }
        info!(backend = %id, "Backend registered");
    }

    pub fn get(&self, id: BackendId) -> Option<Arc<dyn BackendAdapter>> {
        self.backends.get(&id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: BackendId) -> bool {
        self.backends.contains_key(&id)
    }

    /// Registered backends in a stable order
    pub fn list(&self) -> Vec<BackendId> {
        BackendId::ALL
            .into_iter()
            .filter(|id| self.contains(*id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the adapter for a backend; alternation-sensitive ones get the fallback wrapper
pub fn create_adapter(id: BackendId, config: &BackendConfig) -> Result<Arc<dyn BackendAdapter>> {
    match id {
        BackendId::Gpt => Ok(Arc::new(OpenAiBackend::new(id, config)?)),
        BackendId::Claude => {
            let inner = Arc::new(AnthropicBackend::new(id, config)?);
            Ok(Arc::new(AlternationFallback::new(inner)))
        }
    }
}
