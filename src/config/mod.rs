//! Configuration loading

pub mod settings;

pub use settings::{
    BackendConfig, BackendsConfig, CorsConfig, LoggingConfig, RelayConfig, RetryConfig, ServerConfig, Settings,
};
