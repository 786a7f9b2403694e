//! `blueprint design`: the wizard in a terminal.
//!
//! Ctrl-C is the unload trigger (forced save, in-flight step cancelled);
//! leaving the loop for any reason is teardown.

use std::sync::Arc;

use blueprint_engine::{DesignApi, DesignService, LocalDesignApi};
use blueprint_jobs::PollSettings;
use blueprint_steps::ProjectOverview;
use blueprint_store::AllowAll;
use blueprint_utils::error::UserFriendlyError;
use blueprint_wizard::{AutosaveController, DesignWizard, ForcedSave, HttpDesignApi, MountOutcome, WizardError, WizardStep};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{parse_project, server_url};
use crate::Config;
use crate::cli::args::ServerArgs;

pub(crate) async fn design(config: &Config, project_id: &str, local: bool, target: &ServerArgs) -> anyhow::Result<()> {
    let project = parse_project(project_id)?;
    let (api, local_service): (Arc<dyn DesignApi>, Option<Arc<DesignService>>) = if local {
        let service = Arc::new(DesignService::from_config(config, Arc::new(AllowAll))?);
        let api = Arc::new(LocalDesignApi::new(service.clone(), target.user.clone()));
        (api, Some(service))
    } else {
        let api = HttpDesignApi::new(server_url(config, target), target.user.clone())?;
        (Arc::new(api), None)
    };

    let mut wizard = DesignWizard::new(api.clone(), project.clone(), PollSettings::from_config(&config.jobs));
    match wizard.mount().await {
        MountOutcome::Restored { step, .. } => println!("Resuming {project} at step {step}."),
        _ => println!("Designing {project}. Type 'quit' to stop; progress is saved."),
    }
    let autosave = AutosaveController::start(api, project, wizard.subscribe(), config.autosave.debounce());

    let cancel = wizard.cancel_token();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let outcome = drive(&mut wizard, &mut input, &cancel).await;

    if cancel.is_cancelled() {
        autosave.force(ForcedSave::Unload);
    }
    interrupt.abort();
    autosave.teardown_and_flush().await;
    drop(wizard);
    if let Some(service) = local_service.and_then(|s| Arc::try_unwrap(s).ok()) {
        service.shutdown().await;
    }

    if let Some(overview) = outcome? {
        println!("{}", serde_json::to_string_pretty(&overview)?);
    }
    Ok(())
}

enum Input {
    Line(String),
    Eof,
    Interrupted,
}

async fn read_line<R>(input: &mut Lines<R>, cancel: &CancellationToken) -> std::io::Result<Input>
where
    R: AsyncBufRead + Unpin,
{
    tokio::select! {
        () = cancel.cancelled() => Ok(Input::Interrupted),
        line = input.next_line() => Ok(match line? {
            Some(line) => Input::Line(line.trim().to_string()),
            None => Input::Eof,
        }),
    }
}

/// Run the wizard until the user proceeds, quits or input ends.
///
/// Returns the accepted overview, if the user proceeded.
async fn drive<R>(
    wizard: &mut DesignWizard,
    input: &mut Lines<R>,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<ProjectOverview>>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        if let Some(banner) = wizard.banner().map(str::to_string) {
            println!("! {banner}");
            wizard.dismiss_banner();
        }
        let step = wizard.state().step;
        prompt(wizard);

        let line = match read_line(input, cancel).await? {
            Input::Line(line) => line,
            Input::Eof => return Ok(None),
            Input::Interrupted => return Err(WizardError::Cancelled.into()),
        };
        if matches!(line.as_str(), "quit" | "exit") {
            return Ok(None);
        }

        let result = match step {
            WizardStep::Initial | WizardStep::CustomQuestions if wizard.current_question().is_some() => {
                wizard.answer(&line).await
            }
            WizardStep::TechStackChoice => match line.parse::<usize>() {
                Ok(n) if n >= 1 => wizard.select_tech_stack(n - 1).await,
                _ => {
                    println!("Enter the number of an option.");
                    continue;
                }
            },
            WizardStep::Validated => match line.as_str() {
                "p" | "proceed" => return Ok(Some(wizard.proceed().await?)),
                "m" | "modify" => wizard.modify(),
                _ => {
                    println!("Type 'proceed' or 'modify'.");
                    continue;
                }
            },
            _ => match line.as_str() {
                "r" | "retry" => wizard.retry().await,
                _ => {
                    println!("Type 'retry' to run the step again, or 'quit'.");
                    continue;
                }
            },
        };

        match result {
            Ok(()) => {}
            Err(WizardError::Cancelled) => return Err(WizardError::Cancelled.into()),
            // Step failures already set the banner shown on the next turn.
            Err(err) if wizard.banner().is_some() => debug!(error = %err, "Design step failed"),
            Err(err) => println!("! {}", err.user_message()),
        }
    }
}

fn prompt(wizard: &DesignWizard) {
    let state = wizard.state();
    match state.step {
        WizardStep::Initial | WizardStep::CustomQuestions if wizard.current_question().is_some() => {
            if let Some(question) = wizard.current_question() {
                println!("? {}", question.text);
            }
        }
        WizardStep::TechStackChoice if state.tech_stack_options.is_empty() => {
            println!("No technology stack options were offered. Type 'quit' to stop.");
        }
        WizardStep::TechStackChoice => {
            println!("Choose a technology stack:");
            for (i, option) in state.tech_stack_options.iter().enumerate() {
                let stack = &option.stack;
                println!(
                    "  {}. {} ({} / {} / {} / {})",
                    i + 1,
                    option.name,
                    stack.frontend,
                    stack.backend,
                    stack.database,
                    stack.deployment
                );
                if !option.reason.is_empty() {
                    println!("     {}", option.reason);
                }
            }
        }
        WizardStep::Validated => {
            if let Some(overview) = &state.project_overview {
                println!("{}", overview.summary);
            }
            if let Some(report) = &state.validation_result {
                println!("Overall score: {}/100", report.overall_score);
                for issue in report.issues.iter().take(5) {
                    println!("  - {issue}");
                }
            }
            println!("Type 'proceed' to accept or 'modify' to start over.");
        }
        step => println!("Step {step} did not finish. Type 'retry' to run it again."),
    }
}
