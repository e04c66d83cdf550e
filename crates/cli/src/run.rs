//! The `edgeml` command.

use std::path::{Path, PathBuf};

use edgeml_azure::AzureMlEmitter;
use edgeml_core::emitter::Emitter;
use edgeml_core::platform::memory::InMemoryPlatform;
use edgeml_core::resources::SubmittedJob;
use edgeml_core::{MlClient, Pipeline, Provisioner, WorkspaceSettings};
use tracing::Instrument;

use crate::cli::{Cli, CliError};

/// What a successful run did.
#[derive(Debug)]
pub struct RunSummary {
    /// Declared pipeline
    pub pipeline: Pipeline,
    /// Where the job definition was written
    pub emitted: Option<PathBuf>,
    /// Submitted job, with `--run`
    pub job: Option<SubmittedJob>,
}

/// Provision the workspace, then optionally write and submit the pipeline.
pub async fn execute(cli: &Cli) -> Result<RunSummary, CliError> {
    let span = tracing::info_span!(
        "edgeml",
        correlation_id = %crate::tracing::correlation_id()
    );
    run(cli).instrument(span).await
}

async fn run(cli: &Cli) -> Result<RunSummary, CliError> {
    let settings = WorkspaceSettings::load(cli.env_file.as_deref())?;
    let root = project_root(&cli.root)?;
    tracing::info!(
        workspace = %settings.workspace_name,
        resource_group = %settings.resource_group_name,
        root = %root.display(),
        "Preparing workspace"
    );

    let client = connect(cli.offline, &settings, &root)?;
    let provisioner = Provisioner::new(client, settings, &root);
    let provisioned = provisioner.provision().await?;

    let emitted = match &cli.emit {
        Some(path) => {
            write_job_file(&provisioned.pipeline, &root, path).await?;
            Some(path.clone())
        }
        None => None,
    };

    let job = if cli.run {
        let job = provisioner.submit(&provisioned.pipeline).await?;
        tracing::info!(job = %job.name, "Pipeline job submitted with ID: {}", job.name);
        if let Some(url) = &job.studio_url {
            tracing::info!(%url, "Track the job in Azure ML Studio");
        }
        Some(job)
    } else {
        tracing::info!("Setup complete! Pipeline is ready to be submitted.");
        tracing::info!("Run the pipeline with the --run flag to execute it.");
        None
    };

    Ok(RunSummary {
        pipeline: provisioned.pipeline,
        emitted,
        job,
    })
}

fn connect(offline: bool, settings: &WorkspaceSettings, root: &Path) -> Result<MlClient, CliError> {
    if offline {
        tracing::info!("Using the in-memory workspace");
        return Ok(InMemoryPlatform::new().client());
    }
    Ok(edgeml_azure::connect(settings, root)?)
}

fn project_root(root: &Path) -> Result<PathBuf, CliError> {
    std::path::absolute(root).map_err(|e| {
        CliError::config(format!("Invalid project root {}: {e}", root.display()))
    })
}

async fn write_job_file(pipeline: &Pipeline, root: &Path, path: &Path) -> Result<(), CliError> {
    let emitter = AzureMlEmitter::new().with_base_dir(root);
    let yaml = emitter
        .emit_validated(pipeline)
        .map_err(|e| CliError::from(edgeml_core::Error::from(e)))?;
    tokio::fs::write(path, yaml).await.map_err(|e| {
        CliError::other(format!("Failed to write {}: {e}", path.display()))
    })?;
    tracing::info!(
        path = %path.display(),
        format = emitter.format_name(),
        "Wrote pipeline job definition"
    );
    Ok(())
}
