use blueprint_utils::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

use super::{Config, ConfigSource};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// # Example
    ///
    /// ```rust
    /// use blueprint_config::Config;
    /// use std::time::Duration;
    ///
    /// let config = Config::builder()
    ///     .provider("scripted")
    ///     .storage_backend("memory")
    ///     .poll_interval(Duration::from_millis(10))
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.jobs.poll_interval_ms, 10);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Fluent builder for [`Config`].
///
/// Values set here are attributed to [`ConfigSource::Programmatic`]; no
/// environment variables or files are consulted.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
    touched: Vec<&'static str>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn bind(mut self, bind: impl Into<String>) -> Self {
        self.config.server.bind = bind.into();
        self.touched.push("server.bind");
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.jobs.poll_interval_ms = interval.as_millis() as u64;
        self.touched.push("jobs.poll_interval_ms");
        self
    }

    #[must_use]
    pub fn max_poll_attempts(mut self, attempts: u32) -> Self {
        self.config.jobs.max_poll_attempts = attempts;
        self.touched.push("jobs.max_poll_attempts");
        self
    }

    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.jobs.workers = workers;
        self.touched.push("jobs.workers");
        self
    }

    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.jobs.queue_capacity = capacity;
        self.touched.push("jobs.queue_capacity");
        self
    }

    #[must_use]
    pub fn eviction_grace(mut self, grace: Duration) -> Self {
        self.config.jobs.eviction_grace_secs = grace.as_secs();
        self.touched.push("jobs.eviction_grace_secs");
        self
    }

    #[must_use]
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.config.autosave.debounce_ms = debounce.as_millis() as u64;
        self.touched.push("autosave.debounce_ms");
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.config.llm.provider = provider.into();
        self.touched.push("llm.provider");
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = model.into();
        self.touched.push("llm.model");
        self
    }

    #[must_use]
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.config.llm.timeout_secs = timeout.as_secs();
        self.touched.push("llm.timeout_secs");
        self
    }

    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.llm.base_url = url.into();
        self.touched.push("llm.base_url");
        self
    }

    #[must_use]
    pub fn storage_backend(mut self, backend: impl Into<String>) -> Self {
        self.config.storage.backend = backend.into();
        self.touched.push("storage.backend");
        self
    }

    #[must_use]
    pub fn storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.dir = dir.into();
        self.touched.push("storage.dir");
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut config = self.config;
        for key in Config::attributed_keys() {
            config
                .source_attribution
                .insert((*key).to_string(), ConfigSource::Defaults);
        }
        for key in self.touched {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Programmatic);
        }
        config.validate()?;
        Ok(config)
    }
}
