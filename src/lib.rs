//! Trio Relay
//!
//! Relays one shared conversation to several LLM backends (OpenAI and Anthropic)
//! in the order the caller asks for, keeping a single append-only history that
//! every backend and the client see.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod relay;

pub use error::{AppError, Result};

use std::sync::Arc;
use tokio::sync::RwLock;

use backend::BackendRegistry;
use relay::{Dispatcher, HistoryStore, RetryPolicy};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<RwLock<config::Settings>>,
    pub history: Arc<HistoryStore>,
    pub registry: Arc<BackendRegistry>,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    /// Wire the history, registry and dispatcher together from settings
    pub fn new(settings: config::Settings, registry: Arc<BackendRegistry>) -> Self {
        let history = Arc::new(HistoryStore::new());
        let dispatcher = Dispatcher::new(history.clone(), registry.clone(), RetryPolicy::from(&settings.retry))
            .with_system_prompt(settings.relay.system_prompt.clone());

        Self {
            settings: Arc::new(RwLock::new(settings)),
            history,
            registry,
            dispatcher: Arc::new(dispatcher),
        }
    }
}
