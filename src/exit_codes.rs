//! Process exit codes of the `blueprint` binary.

use blueprint_utils::ErrorCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// General failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Invalid command-line arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// A user-supplied value was rejected (bad answer, unknown job)
    pub const INVALID_INPUT: ExitCode = ExitCode(3);

    /// Storage could not be read or written
    pub const PERSISTENCE: ExitCode = ExitCode(4);

    /// Server unreachable or saturated
    pub const UNAVAILABLE: ExitCode = ExitCode(69);

    /// A design step or the language model failed
    pub const STEP_FAILURE: ExitCode = ExitCode(70);

    /// Stopped by Ctrl-C
    pub const INTERRUPTED: ExitCode = ExitCode(130);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn for_category(category: &ErrorCategory) -> Self {
        match category {
            ErrorCategory::Configuration => Self::CLI_ARGS,
            ErrorCategory::Validation => Self::INVALID_INPUT,
            ErrorCategory::Persistence => Self::PERSISTENCE,
            ErrorCategory::ResourceLimits => Self::UNAVAILABLE,
            ErrorCategory::LanguageModel | ErrorCategory::JobExecution => Self::STEP_FAILURE,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(ExitCode::for_category(&ErrorCategory::Configuration), ExitCode::CLI_ARGS);
        assert_eq!(ExitCode::for_category(&ErrorCategory::LanguageModel).as_i32(), 70);
        assert_eq!(i32::from(ExitCode::SUCCESS), 0);
    }
}
