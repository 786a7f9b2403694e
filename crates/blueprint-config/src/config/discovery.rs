use anyhow::{Context, Result};
use blueprint_utils::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use super::{CliArgs, Config, ConfigSource};

/// Environment variable that relocates the config file and state directory
pub const HOME_ENV: &str = "BLUEPRINT_HOME";

/// TOML configuration file structure; every key is optional
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    server: Option<TomlServer>,
    jobs: Option<TomlJobs>,
    autosave: Option<TomlAutosave>,
    llm: Option<TomlLlm>,
    storage: Option<TomlStorage>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlServer {
    bind: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlJobs {
    poll_interval_ms: Option<u64>,
    max_poll_attempts: Option<u32>,
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    eviction_grace_secs: Option<u64>,
    eviction_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlAutosave {
    debounce_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlLlm {
    provider: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    validation_max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
    api_key_env: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlStorage {
    backend: Option<String>,
    dir: Option<PathBuf>,
}

/// Copy `$src.$field` into `$dst.$field` when present and record its source.
macro_rules! apply {
    ($attr:expr, $source:expr, $section:literal, $dst:expr, $src:expr, [$($field:ident),+ $(,)?]) => {
        $(
            if let Some(value) = $src.$field {
                $dst.$field = value;
                $attr.insert(
                    concat!($section, ".", stringify!($field)).to_string(),
                    $source.clone(),
                );
            }
        )+
    };
}

impl Config {
    /// Discover and load configuration with precedence: CLI > file > defaults
    ///
    /// Uses the current working directory for config file discovery when no
    /// explicit path is given.
    pub fn discover(cli_args: &CliArgs) -> Result<Self> {
        let start_dir = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory
    pub fn discover_from(start_dir: &Path, cli_args: &CliArgs) -> Result<Self> {
        let mut config = Config::default();
        for key in Self::attributed_keys() {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Defaults);
        }

        let home = std::env::var_os(HOME_ENV).map(PathBuf::from);
        if let Some(home) = &home {
            config.storage.dir = home.join("state");
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.exists() {
                    return Err(ConfigError::NotFound {
                        path: explicit.display().to_string(),
                    }
                    .into());
                }
                Some(explicit.clone())
            }
            None => match &home {
                Some(home) => Some(home.join("config.toml")).filter(|p| p.exists()),
                None => Self::discover_config_file_from(start_dir),
            },
        };

        if let Some(path) = &config_path {
            let file = Self::load_config_file(path)?;
            config.apply_file(file, ConfigSource::ConfigFile(path.clone()));
            config.config_path = Some(path.clone());
        }

        config.apply_cli(cli_args);
        config.validate()?;
        Ok(config)
    }

    /// Walk upward from `start_dir` looking for `.blueprint/config.toml`,
    /// stopping at the repository root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Path) -> Option<PathBuf> {
        let mut current = Some(start_dir);
        while let Some(dir) = current {
            let candidate = dir.join(".blueprint").join("config.toml");
            if candidate.exists() {
                return Some(candidate);
            }
            if dir.join(".git").exists() || dir.join(".hg").exists() {
                break;
            }
            current = dir.parent();
        }
        None
    }

    fn load_config_file(path: &Path) -> Result<TomlConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).map_err(|e| {
            ConfigError::InvalidFile(format!("{}: {}", path.display(), e.message())).into()
        })
    }

    fn apply_file(&mut self, file: TomlConfig, source: ConfigSource) {
        let attr = &mut self.source_attribution;
        if let Some(server) = file.server {
            apply!(attr, source, "server", self.server, server, [bind]);
        }
        if let Some(jobs) = file.jobs {
            apply!(
                attr,
                source,
                "jobs",
                self.jobs,
                jobs,
                [
                    poll_interval_ms,
                    max_poll_attempts,
                    workers,
                    queue_capacity,
                    eviction_grace_secs,
                    eviction_interval_secs,
                ]
            );
        }
        if let Some(autosave) = file.autosave {
            apply!(attr, source, "autosave", self.autosave, autosave, [debounce_ms]);
        }
        if let Some(llm) = file.llm {
            apply!(
                attr,
                source,
                "llm",
                self.llm,
                llm,
                [
                    provider,
                    model,
                    max_tokens,
                    validation_max_tokens,
                    temperature,
                    timeout_secs,
                    api_key_env,
                    base_url,
                ]
            );
        }
        if let Some(storage) = file.storage {
            apply!(attr, source, "storage", self.storage, storage, [backend, dir]);
        }
    }

    fn apply_cli(&mut self, cli: &CliArgs) {
        let mut set = |key: &str| {
            self.source_attribution
                .insert(key.to_string(), ConfigSource::Cli);
        };
        if let Some(bind) = &cli.bind {
            self.server.bind = bind.clone();
            set("server.bind");
        }
        if let Some(provider) = &cli.provider {
            self.llm.provider = provider.clone();
            set("llm.provider");
        }
        if let Some(model) = &cli.model {
            self.llm.model = model.clone();
            set("llm.model");
        }
        if let Some(backend) = &cli.storage_backend {
            self.storage.backend = backend.clone();
            set("storage.backend");
        }
        if let Some(dir) = &cli.storage_dir {
            self.storage.dir = dir.clone();
            set("storage.dir");
        }
    }

    pub(crate) fn attributed_keys() -> &'static [&'static str] {
        &[
            "server.bind",
            "jobs.poll_interval_ms",
            "jobs.max_poll_attempts",
            "jobs.workers",
            "jobs.queue_capacity",
            "jobs.eviction_grace_secs",
            "jobs.eviction_interval_secs",
            "autosave.debounce_ms",
            "llm.provider",
            "llm.model",
            "llm.max_tokens",
            "llm.validation_max_tokens",
            "llm.temperature",
            "llm.timeout_secs",
            "llm.api_key_env",
            "llm.base_url",
            "storage.backend",
            "storage.dir",
        ]
    }
}
