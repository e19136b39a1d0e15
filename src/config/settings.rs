//! Application settings and configuration management

use crate::error::{AppError, Result};
use crate::relay::message::BackendId;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "TRIO_RELAY_CONFIG";

/// Comma separated list of allowed browser origins
pub const CORS_ORIGINS_ENV: &str = "CORS_ORIGINS";

const DEFAULT_CONFIG_PATH: &str = "config/relay.yaml";
const ENV_PREFIX: &str = "TRIO_RELAY";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub retry: RetryConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    pub backends: BackendsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

/// Browser access control
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

impl CorsConfig {
    /// Parse a comma separated origin list, dropping blanks
    pub fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn allows_any(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Retry policy applied to every backend call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_timeout")]
    pub base_timeout_ms: u64,
    #[serde(default = "default_timeout_step")]
    pub timeout_step_ms: u64,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_timeout() -> u64 {
    20_000
}

fn default_timeout_step() -> u64 {
    10_000
}

fn default_backoff_base() -> u64 {
    1_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_timeout_ms: default_base_timeout(),
            timeout_step_ms: default_timeout_step(),
            backoff_base_ms: default_backoff_base(),
        }
    }
}

/// Conversation-level options
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct RelayConfig {
    /// Leading system message sent ahead of the labeled history
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Connection settings for one remote backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base URL, e.g. `https://api.openai.com/v1`
    pub endpoint: String,

    pub model: String,

    /// Environment variable holding the credential
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Inline credential, used when `api_key_env` is unset or empty
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Protocol version header (Anthropic)
    #[serde(default)]
    pub api_version: Option<String>,
}

fn default_true() -> bool {
    true
}

impl BackendConfig {
    pub fn openai_default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            api_key: None,
            max_tokens: None,
            api_version: None,
        }
    }

    pub fn anthropic_default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.anthropic.com/v1".to_string(),
            model: "claude-3-sonnet-20240229".to_string(),
            api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
            api_key: None,
            max_tokens: Some(1000),
            api_version: Some("2023-06-01".to_string()),
        }
    }

    /// Credential from the environment, falling back to the inline key
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

/// One entry per supported backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendsConfig {
    pub gpt: BackendConfig,
    pub claude: BackendConfig,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            gpt: BackendConfig::openai_default(),
            claude: BackendConfig::anthropic_default(),
        }
    }
}

impl BackendsConfig {
    pub fn get(&self, id: BackendId) -> &BackendConfig {
        match id {
            BackendId::Gpt => &self.gpt,
            BackendId::Claude => &self.claude,
        }
    }

    /// Enabled backends in declaration order
    pub fn enabled(&self) -> Vec<(BackendId, &BackendConfig)> {
        BackendId::ALL
            .into_iter()
            .map(|id| (id, self.get(id)))
            .filter(|(_, config)| config.enabled)
            .collect()
    }
}

impl Settings {
    /// Load settings from the default file location and the environment
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut settings = Self::load_from_path(&path)?;
        settings.apply_cors_override(std::env::var(CORS_ORIGINS_ENV).ok().as_deref());
        Ok(settings)
    }

    /// Replace the origin list with a comma-separated override, if one is set
    pub fn apply_cors_override(&mut self, raw: Option<&str>) {
        if let Some(origins) = raw {
            self.cors.allowed_origins = CorsConfig::parse_origins(origins);
        }
    }

    /// Load settings from a YAML or TOML file (optional) plus environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let format = if path.extension().map_or(false, |ext| ext == "yaml" || ext == "yml") {
            FileFormat::Yaml
        } else {
            FileFormat::Toml
        };

        let gpt = BackendConfig::openai_default();
        let claude = BackendConfig::anthropic_default();

        let mut builder = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("cors.allowed_origins", default_allowed_origins())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?
            .set_default("retry.max_retries", i64::from(default_max_retries()))?
            .set_default("retry.base_timeout_ms", default_base_timeout() as i64)?
            .set_default("retry.timeout_step_ms", default_timeout_step() as i64)?
            .set_default("retry.backoff_base_ms", default_backoff_base() as i64)?
            .set_default("backends.gpt.endpoint", gpt.endpoint)?
            .set_default("backends.gpt.model", gpt.model)?
            .set_default("backends.gpt.api_key_env", gpt.api_key_env.unwrap_or_default())?
            .set_default("backends.claude.endpoint", claude.endpoint)?
            .set_default("backends.claude.model", claude.model)?
            .set_default("backends.claude.api_key_env", claude.api_key_env.unwrap_or_default())?
            .set_default("backends.claude.max_tokens", i64::from(claude.max_tokens.unwrap_or_default()))?
            .set_default("backends.claude.api_version", claude.api_version.unwrap_or_default())?;

        if path.exists() {
            builder = builder.add_source(File::from(path).format(format));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        if self.retry.base_timeout_ms == 0 {
            return Err(invalid("retry.base_timeout_ms must be greater than 0"));
        }

        let enabled = self.backends.enabled();
        if enabled.is_empty() {
            return Err(invalid("At least one backend must be enabled"));
        }

        for (id, backend) in enabled {
            if backend.endpoint.trim().is_empty() {
                return Err(invalid(&format!("Backend '{}' must have an endpoint", id)));
            }
            if backend.model.trim().is_empty() {
                return Err(invalid(&format!("Backend '{}' must name a model", id)));
            }
        }

        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
            },
            cors: CorsConfig {
                allowed_origins: default_allowed_origins(),
            },
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
            retry: RetryConfig::default(),
            relay: RelayConfig::default(),
            backends: BackendsConfig::default(),
        }
    }
}
