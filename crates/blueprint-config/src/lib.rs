//! Configuration for blueprint.
//!
//! Values are resolved with the precedence CLI > config file > defaults and
//! every resolved key remembers where it came from, so that
//! `blueprint config show` can explain the effective configuration.

mod config;

pub use config::{
    AutosaveConfig, CliArgs, Config, ConfigBuilder, ConfigSource, JobsConfig, LlmConfig,
    LlmProvider, ServerConfig, StorageBackend, StorageConfig,
};
