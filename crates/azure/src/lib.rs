//! Azure Machine Learning backend for edgeml.
//!
//! Compute, datastores and role assignments go through Azure Resource Manager;
//! environment registration and job submission go through the `az ml` CLI, which
//! uploads build contexts and component code.

pub mod arm;
pub mod authorization;
pub mod cli;
pub mod compute;
pub mod credential;
pub mod datastore;
pub mod emitter;
pub mod environment;
pub mod job;
pub mod schema;

use std::path::PathBuf;
use std::sync::Arc;

use edgeml_core::platform::PlatformResult;
use edgeml_core::{MlClient, WorkspaceSettings};

pub use arm::{ArmClient, ArmOptions};
pub use cli::AzCli;
pub use credential::{DefaultCredential, TokenCredential};
pub use emitter::AzureMlEmitter;

/// How to reach Azure.
#[derive(Debug, Clone, Default)]
pub struct AzureOptions {
    /// Resource Manager settings
    pub arm: ArmOptions,
    /// CLI runner
    pub cli: AzCli,
}

/// Build a client for the workspace using the default credential chain.
pub fn connect(
    settings: &WorkspaceSettings,
    project_root: impl Into<PathBuf>,
) -> PlatformResult<MlClient> {
    let options = AzureOptions::default();
    let credential = Arc::new(DefaultCredential::from_env(options.cli.clone()));
    connect_with(settings, project_root, credential, options)
}

/// Build a client for the workspace with an explicit credential and options.
pub fn connect_with(
    settings: &WorkspaceSettings,
    project_root: impl Into<PathBuf>,
    credential: Arc<dyn TokenCredential>,
    options: AzureOptions,
) -> PlatformResult<MlClient> {
    let arm = ArmClient::new(credential, options.arm)?;
    let workspace_id = settings.workspace_id();
    let cli = options.cli.for_workspace(settings);

    tracing::debug!(workspace = %workspace_id, "Connecting to Azure Machine Learning workspace");

    Ok(MlClient {
        compute: Arc::new(compute::ArmCompute::new(arm.clone(), workspace_id.clone())),
        datastores: Arc::new(datastore::ArmDatastores::new(arm.clone(), workspace_id)),
        authorization: Arc::new(authorization::ArmAuthorization::new(arm)),
        environments: Arc::new(environment::CliEnvironments::new(cli.clone())),
        jobs: Arc::new(job::CliJobs::new(cli, project_root)),
    })
}
