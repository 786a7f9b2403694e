use clap::Parser;

use blueprint_engine::{ApiError, ServiceError};
use blueprint_jobs::{LaunchError, PollError};
use blueprint_store::StoreError;
use blueprint_utils::error::{ErrorCategory, UserFriendlyError, render_for_user};
use blueprint_utils::logging::{LogFormat, init_tracing};
use blueprint_utils::redaction::redact_secrets;
use blueprint_utils::{BlueprintError, ConfigError, LlmError};
use blueprint_wizard::WizardError;

use super::args::{Cli, Commands, ConfigCommands, LogFormatArg};
use super::commands::{self, CliError};
use crate::exit_codes::ExitCode;
use crate::{CliArgs, Config};

/// Entry point of the binary.
///
/// Prints everything itself, including errors; `main` only turns the
/// returned code into the process exit status.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let format = match cli.log_format {
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    if let Err(err) = init_tracing(cli.verbose, format) {
        eprintln!("warning: logging disabled: {err}");
    }

    let cli_args = CliArgs {
        config_path: cli.config.clone(),
        bind: match &cli.command {
            Commands::Serve { bind, .. } => bind.clone(),
            _ => None,
        },
        provider: cli.provider.clone(),
        model: cli.model.clone(),
        storage_backend: cli.storage_backend.clone(),
        storage_dir: cli.storage_dir.clone(),
    };

    let config = match Config::discover(&cli_args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", report_config_error(&err));
            return Err(ExitCode::CLI_ARGS);
        }
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: could not start the async runtime: {err}");
            return Err(ExitCode::INTERNAL);
        }
    };

    let result = runtime.block_on(async {
        match &cli.command {
            Commands::Serve { require_user, .. } => commands::serve::serve(&config, *require_user).await,
            Commands::Design {
                project_id,
                local,
                target,
            } => commands::design::design(&config, project_id, *local, target).await,
            Commands::JobStatus {
                job_id,
                project,
                wait,
                target,
            } => commands::job_status::job_status(&config, job_id, project, *wait, target).await,
            Commands::Config(ConfigCommands::Show) => {
                commands::config::show(&config);
                Ok(())
            }
        }
    });

    result.map_err(|err| report(&err))
}

fn report_config_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ConfigError>() {
        Some(config_err) => render_for_user(config_err),
        None => format!("[{}] {err:#}", ErrorCategory::Configuration),
    }
}

/// Print `err` for the user and pick the exit code.
fn report(err: &anyhow::Error) -> ExitCode {
    if matches!(err.downcast_ref::<WizardError>(), Some(WizardError::Cancelled)) {
        eprintln!("Interrupted; progress saved.");
        return ExitCode::INTERRUPTED;
    }

    macro_rules! friendly {
        ($($ty:ty),+ $(,)?) => {
            $(
                if let Some(typed) = err.downcast_ref::<$ty>() {
                    eprintln!("{}", redact_secrets(&render_for_user(typed)));
                    return ExitCode::for_category(&typed.category());
                }
            )+
        };
    }
    friendly!(
        WizardError,
        ApiError,
        PollError,
        LaunchError,
        ServiceError,
        LlmError,
        StoreError,
        ConfigError,
        CliError,
        BlueprintError,
    );

    eprintln!("error: {}", redact_secrets(&format!("{err:#}")));
    ExitCode::INTERNAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_maps_to_interrupted() {
        let err = anyhow::Error::from(WizardError::Cancelled);
        assert_eq!(report(&err), ExitCode::INTERRUPTED);
    }

    #[test]
    fn test_typed_errors_map_by_category() {
        let err = anyhow::Error::from(CliError::JobNotFound("job_1".to_string()));
        assert_eq!(report(&err), ExitCode::INVALID_INPUT);

        let err = anyhow::Error::from(ApiError::Transport("connection refused".to_string()));
        assert_eq!(report(&err), ExitCode::for_category(&ApiError::Transport(String::new()).category()));
    }

    #[test]
    fn test_untyped_errors_are_internal() {
        let err = anyhow::anyhow!("something odd");
        assert_eq!(report(&err), ExitCode::INTERNAL);
    }
}
