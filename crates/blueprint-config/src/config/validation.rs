use blueprint_utils::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values, collecting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        let positive = [
            ("jobs.poll_interval_ms", self.jobs.poll_interval_ms),
            ("jobs.max_poll_attempts", u64::from(self.jobs.max_poll_attempts)),
            ("jobs.workers", self.jobs.workers as u64),
            ("jobs.queue_capacity", self.jobs.queue_capacity as u64),
            ("jobs.eviction_interval_secs", self.jobs.eviction_interval_secs),
            ("autosave.debounce_ms", self.autosave.debounce_ms),
            ("llm.max_tokens", u64::from(self.llm.max_tokens)),
            ("llm.validation_max_tokens", u64::from(self.llm.validation_max_tokens)),
            ("llm.timeout_secs", self.llm.timeout_secs),
        ];
        for (key, value) in positive {
            if value == 0 {
                errors.push(format!("{key} must be greater than 0"));
            }
        }

        if self.llm.provider_kind().is_none() {
            errors.push(format!(
                "llm.provider '{}' is not one of: anthropic, scripted",
                self.llm.provider
            ));
        }
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            errors.push("llm.temperature must be between 0.0 and 1.0".to_string());
        }
        if self.llm.model.trim().is_empty() {
            errors.push("llm.model must not be empty".to_string());
        }
        if self.storage.backend_kind().is_none() {
            errors.push(format!(
                "storage.backend '{}' is not one of: file, memory",
                self.storage.backend
            ));
        }
        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "server.bind '{}' is not a socket address",
                self.server.bind
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationFailed { errors })
        }
    }
}
