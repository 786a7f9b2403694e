use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

mod builder;
mod discovery;
mod sources;
mod validation;

pub use builder::ConfigBuilder;

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub jobs: JobsConfig,
    pub autosave: AutosaveConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    /// Where each dotted key (`jobs.workers`, `llm.model`, ...) was set
    pub source_attribution: HashMap<String, ConfigSource>,
    /// Config file that contributed values, if any
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub workers: usize,
    pub queue_capacity: usize,
    pub eviction_grace_secs: u64,
    pub eviction_interval_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_poll_attempts: 120,
            workers: 4,
            queue_capacity: 64,
            eviction_grace_secs: 120,
            eviction_interval_secs: 30,
        }
    }
}

impl JobsConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn eviction_grace(&self) -> Duration {
        Duration::from_secs(self.eviction_grace_secs)
    }

    #[must_use]
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutosaveConfig {
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self { debounce_ms: 1000 }
    }
}

impl AutosaveConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Known language model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Anthropic,
    /// Canned responses, for offline runs and tests
    Scripted,
}

impl LlmProvider {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "anthropic" => Some(Self::Anthropic),
            "scripted" => Some(Self::Scripted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub max_tokens: u32,
    pub validation_max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub api_key_env: String,
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4096,
            validation_max_tokens: 2048,
            temperature: 0.2,
            timeout_secs: 300,
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn provider_kind(&self) -> Option<LlmProvider> {
        LlmProvider::parse(&self.provider)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    File,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: String,
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            dir: PathBuf::from(".blueprint/state"),
        }
    }
}

impl StorageConfig {
    #[must_use]
    pub fn backend_kind(&self) -> Option<StorageBackend> {
        match self.backend.as_str() {
            "file" => Some(StorageBackend::File),
            "memory" => Some(StorageBackend::Memory),
            _ => None,
        }
    }
}

/// Source of a configuration value for attribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    ConfigFile(PathBuf),
    Cli,
    Programmatic,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Defaults => write!(f, "default"),
            Self::ConfigFile(path) => write!(f, "config file ({})", path.display()),
            Self::Cli => write!(f, "cli"),
            Self::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// Overrides collected from the command line.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub storage_backend: Option<String>,
    pub storage_dir: Option<PathBuf>,
}
