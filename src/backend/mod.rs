//! Backend module - adapter traits, provider clients, fallback and registry

pub mod anthropic;
pub mod fallback;
pub mod openai;
pub mod registry;
pub mod traits;

pub use anthropic::AnthropicBackend;
pub use fallback::{is_role_alternation_error, AlternationFallback, AlternationPredicate};
pub use openai::OpenAiBackend;
pub use registry::BackendRegistry;
pub use traits::{BackendAdapter, RoleMappedBackend, RoleMapping};
