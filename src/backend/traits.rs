//! Backend adapter contracts

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ProviderError;
use crate::relay::message::{BackendId, LabeledMessage};

/// Anything the dispatcher can ask for a reply
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Which backend this adapter speaks for
    fn backend(&self) -> BackendId;

    /// Send the labeled context and return the reply text
    async fn call(&self, messages: &[LabeledMessage], timeout: Duration) -> Result<String, ProviderError>;
}

/// How an alternation-sensitive backend maps labeled roles onto its wire format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMapping {
    /// Roles unchanged, leading system content in a dedicated field
    Faithful,
    /// System content dropped, peer assistant turns sent as user turns
    Compat,
}

/// A backend that requires strictly alternating user/assistant turns
#[async_trait]
pub trait RoleMappedBackend: Send + Sync {
    fn backend(&self) -> BackendId;

    async fn call_mapped(
        &self,
        mapping: RoleMapping,
        messages: &[LabeledMessage],
        timeout: Duration,
    ) -> Result<String, ProviderError>;
}
