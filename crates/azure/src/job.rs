//! Pipeline job submission with `az ml job create`.

use std::path::PathBuf;

use async_trait::async_trait;
use edgeml_core::PlatformError;
use edgeml_core::emitter::Emitter;
use edgeml_core::pipeline::Pipeline;
use edgeml_core::platform::{JobApi, PlatformResult};
use edgeml_core::resources::SubmittedJob;

use crate::cli::AzCli;
use crate::emitter::AzureMlEmitter;
use crate::schema::JobCreated;

/// Submits pipelines by writing them to a temporary job file.
#[derive(Debug, Clone)]
pub struct CliJobs {
    cli: AzCli,
    emitter: AzureMlEmitter,
}

impl CliJobs {
    /// Resolve component code against `project_root`.
    #[must_use]
    pub fn new(cli: AzCli, project_root: impl Into<PathBuf>) -> Self {
        Self {
            cli,
            emitter: AzureMlEmitter::new().with_base_dir(project_root),
        }
    }
}

#[async_trait]
impl JobApi for CliJobs {
    async fn submit(&self, pipeline: &Pipeline) -> PlatformResult<SubmittedJob> {
        let operation = format!("submit pipeline '{}'", pipeline.name);
        let yaml = self
            .emitter
            .emit_validated(pipeline)
            .map_err(|e| PlatformError::request(&operation, e.to_string()))?;

        let file = tempfile::Builder::new()
            .prefix("edgeml-job-")
            .suffix(".yml")
            .tempfile()
            .map_err(|e| PlatformError::request(&operation, e.to_string()))?;
        tokio::fs::write(file.path(), yaml)
            .await
            .map_err(|e| PlatformError::request(&operation, e.to_string()))?;

        let path = file.path().display().to_string();
        tracing::debug!(file = %path, "Submitting pipeline job");
        let created: JobCreated = self
            .cli
            .run_json("az ml job create", &["ml", "job", "create", "--file", &path])
            .await?;

        Ok(SubmittedJob {
            studio_url: created.studio_url().map(ToString::to_string),
            name: created.name,
            status: created.status,
        })
    }
}
