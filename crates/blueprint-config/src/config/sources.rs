use std::collections::BTreeMap;

use super::{Config, ConfigSource};

impl Config {
    /// Effective configuration as `key -> (value, source)`, sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let values = [
            ("server.bind", self.server.bind.clone()),
            ("jobs.poll_interval_ms", self.jobs.poll_interval_ms.to_string()),
            ("jobs.max_poll_attempts", self.jobs.max_poll_attempts.to_string()),
            ("jobs.workers", self.jobs.workers.to_string()),
            ("jobs.queue_capacity", self.jobs.queue_capacity.to_string()),
            ("jobs.eviction_grace_secs", self.jobs.eviction_grace_secs.to_string()),
            (
                "jobs.eviction_interval_secs",
                self.jobs.eviction_interval_secs.to_string(),
            ),
            ("autosave.debounce_ms", self.autosave.debounce_ms.to_string()),
            ("llm.provider", self.llm.provider.clone()),
            ("llm.model", self.llm.model.clone()),
            ("llm.max_tokens", self.llm.max_tokens.to_string()),
            (
                "llm.validation_max_tokens",
                self.llm.validation_max_tokens.to_string(),
            ),
            ("llm.temperature", self.llm.temperature.to_string()),
            ("llm.timeout_secs", self.llm.timeout_secs.to_string()),
            ("llm.api_key_env", self.llm.api_key_env.clone()),
            ("llm.base_url", self.llm.base_url.clone()),
            ("storage.backend", self.storage.backend.clone()),
            ("storage.dir", self.storage.dir.display().to_string()),
        ];

        values
            .into_iter()
            .map(|(key, value)| {
                let source = self
                    .source_attribution
                    .get(key)
                    .unwrap_or(&ConfigSource::Defaults)
                    .to_string();
                (key.to_string(), (value, source))
            })
            .collect()
    }
}
