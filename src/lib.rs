//! # blueprint
//!
//! Resumable, language-model-driven project design. A user answers a few
//! questions; background jobs and streamed steps turn the answers into a
//! technology choice, a reality check and a validated project overview.
//!
//! The workspace crates are re-exported here:
//!
//! - [`config`]: layered configuration (`.blueprint/config.toml`)
//! - [`llm`]: language model gateway
//! - [`extraction`]: lenient JSON recovery from model output
//! - [`steps`]: step templates, result schemas and design validation
//! - [`store`]: project blob persistence, job mirror, conversation log
//! - [`jobs`]: job store, executor, launcher, worker pool and poller
//! - [`engine`]: the design service and its client-side API
//! - [`wizard`]: the wizard state machine, autosave and HTTP client
//! - [`server`]: the HTTP boundary

pub mod cli;
pub mod exit_codes;

pub use blueprint_config as config;
pub use blueprint_engine as engine;
pub use blueprint_extraction as extraction;
pub use blueprint_jobs as jobs;
pub use blueprint_llm as llm;
pub use blueprint_server as server;
pub use blueprint_steps as steps;
pub use blueprint_store as store;
pub use blueprint_utils as utils;
pub use blueprint_wizard as wizard;

pub use blueprint_config::{CliArgs, Config};
pub use blueprint_utils::{BlueprintError, UserFriendlyError};
pub use exit_codes::ExitCode;
