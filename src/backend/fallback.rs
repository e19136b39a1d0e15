//! Faithful-then-compat fallback for alternation-sensitive backends

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::backend::traits::{BackendAdapter, RoleMappedBackend, RoleMapping};
use crate::error::ProviderError;
use crate::relay::message::{BackendId, LabeledMessage};

/// Decides whether a faithful-mode failure was a role-alternation rejection
pub type AlternationPredicate = fn(&ProviderError) -> bool;

/// Heuristic: the remote service reports alternation problems only in text.
///
/// Replace with a structured error code check once the service exposes one.
pub fn is_role_alternation_error(err: &ProviderError) -> bool {
    let text = err.to_string().to_lowercase();
    text.contains("alternate") || text.contains("role")
}

/// Tries the faithful mapping, and the compat mapping once if the faithful
/// call was rejected for role alternation. Any other failure is returned as is.
pub struct AlternationFallback {
    inner: Arc<dyn RoleMappedBackend>,
    predicate: AlternationPredicate,
}

impl AlternationFallback {
    pub fn new(inner: Arc<dyn RoleMappedBackend>) -> Self {
        Self::with_predicate(inner, is_role_alternation_error)
    }

    pub fn with_predicate(inner: Arc<dyn RoleMappedBackend>, predicate: AlternationPredicate) -> Self {
        Self { inner, predicate }
    }
}

#[async_trait]
impl BackendAdapter for AlternationFallback {
    fn backend(&self) -> BackendId {
        self.inner.backend()
    }

    async fn call(&self, messages: &[LabeledMessage], timeout: Duration) -> Result<String, ProviderError> {
        let faithful_err = match self
            .inner
            .call_mapped(RoleMapping::Faithful, messages, timeout)
            .await
        {
            Ok(text) => return Ok(text),
            Err(err) => err,
        };

        if !(self.predicate)(&faithful_err) {
            return Err(faithful_err);
        }

        info!(
            backend = %self.backend(),
            error = %faithful_err,
            "Faithful mapping rejected for role alternation, retrying with compat mapping"
        );

        self.inner
            .call_mapped(RoleMapping::Compat, messages, timeout)
            .await
            .map_err(|err| {
                warn!(backend = %self.backend(), error = %err, "Compat mapping also failed");
                err
            })
    }
}
