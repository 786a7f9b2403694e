use std::sync::Arc;

use blueprint_engine::{ApiBridge, DesignApi};
use blueprint_jobs::{JobId, PollSettings, await_job};
use blueprint_wizard::HttpDesignApi;

use super::{CliError, parse_project, server_url};
use crate::Config;
use crate::cli::args::ServerArgs;

/// `blueprint job-status`: print the job snapshot, or with `wait` its result.
pub(crate) async fn job_status(
    config: &Config,
    job_id: &str,
    project: &str,
    wait: bool,
    target: &ServerArgs,
) -> anyhow::Result<()> {
    let job_id = JobId::parse(job_id).map_err(|err| CliError::InvalidInput {
        what: "job id",
        reason: err.to_string(),
    })?;
    let project = parse_project(project)?;
    let api: Arc<dyn DesignApi> = Arc::new(HttpDesignApi::new(server_url(config, target), target.user.clone())?);

    if wait {
        let bridge = ApiBridge::new(api);
        let result = await_job(&bridge, &job_id, &project, PollSettings::from_config(&config.jobs)).await?;
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    match api.job_status(&job_id, &project).await? {
        Some(snapshot) => {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            Ok(())
        }
        None => Err(CliError::JobNotFound(job_id.to_string()).into()),
    }
}
