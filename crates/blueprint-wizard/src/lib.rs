//! Client side of the design workflow.
//!
//! [`DesignWizard`] walks a project from three seed questions to a validated
//! overview, [`AutosaveController`] keeps its snapshot persisted, and
//! [`HttpDesignApi`] lets both run against a remote `blueprint serve`.

pub mod autosave;
pub mod error;
pub mod http_api;
pub mod machine;
pub mod state;

pub use autosave::{AutosaveController, ForcedSave};
pub use error::WizardError;
pub use http_api::{HttpDesignApi, USER_HEADER};
pub use machine::{DesignWizard, MountOutcome, Question};
pub use state::{SEED_QUESTIONS, WizardState, WizardStep, custom_key};
