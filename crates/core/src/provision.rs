//! The provisioning flow.
//!
//! Runs strictly in order and awaits each platform call before the next:
//! layout check, compute cluster, storage role grant, environments, pipeline.
//! The layout check happens before any platform call.

use std::path::PathBuf;

use tracing::instrument;

use crate::blueprint::Blueprint;
use crate::error::{Error, Result};
use crate::layout::ProjectLayout;
use crate::pipeline::Pipeline;
use crate::platform::MlClient;
use crate::resources::{
    ComputeInfo, EnvironmentCatalog, EnvironmentSpec, RoleAssignmentRequest, RoleOutcome,
    SubmittedJob,
};
use crate::settings::WorkspaceSettings;

/// What a provisioning run produced.
#[derive(Debug, Clone)]
pub struct Provisioned {
    /// The compute cluster as read back after provisioning
    pub compute: ComputeInfo,
    /// Whether this run created the cluster
    pub created_compute: bool,
    /// Storage account the role was granted on
    pub storage_account: String,
    /// Outcome of the role grant
    pub role: RoleOutcome,
    /// Registered environment versions
    pub environments: EnvironmentCatalog,
    /// The validated pipeline, ready for submission
    pub pipeline: Pipeline,
}

/// Drives the platform through the setup sequence.
#[derive(Debug)]
pub struct Provisioner {
    client: MlClient,
    settings: WorkspaceSettings,
    layout: ProjectLayout,
    blueprint: Blueprint,
}

impl Provisioner {
    /// Create a provisioner for the default blueprint, checking directories under `project_root`.
    #[must_use]
    pub fn new(
        client: MlClient,
        settings: WorkspaceSettings,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        let blueprint = Blueprint::default();
        let layout = ProjectLayout::new(project_root, blueprint.required_directories.clone());
        Self {
            client,
            settings,
            layout,
            blueprint,
        }
    }

    /// Replace the blueprint; the layout follows its required directories.
    #[must_use]
    pub fn with_blueprint(mut self, blueprint: Blueprint) -> Self {
        self.layout = ProjectLayout::new(
            self.layout.root().to_path_buf(),
            blueprint.required_directories.clone(),
        );
        self.blueprint = blueprint;
        self
    }

    /// Run the full setup sequence.
    #[instrument(name = "provision", skip(self), fields(workspace = %self.settings.workspace_name))]
    pub async fn provision(&self) -> Result<Provisioned> {
        self.layout.verify()?;

        let (compute, created_compute) = self.ensure_compute().await?;
        let principal_id = compute
            .principal_id()
            .ok_or_else(|| Error::MissingIdentity {
                cluster: compute.name.clone(),
            })?
            .to_string();
        tracing::info!(%principal_id, "Compute cluster identity principal ID");

        let datastore = self.client.datastores.get(&self.blueprint.datastore).await?;
        let role = self
            .grant_storage_role(&datastore.account_name, &principal_id)
            .await?;

        let environments = self.register_environments().await?;

        tracing::info!("Creating pipeline components");
        let pipeline = self.blueprint.pipeline(&environments)?;
        tracing::info!(
            pipeline = %pipeline.name,
            steps = pipeline.steps.len(),
            "Pipeline declared"
        );

        Ok(Provisioned {
            compute,
            created_compute,
            storage_account: datastore.account_name,
            role,
            environments,
            pipeline,
        })
    }

    /// Submit a pipeline as a job.
    #[instrument(name = "submit", skip(self, pipeline), fields(pipeline = %pipeline.name))]
    pub async fn submit(&self, pipeline: &Pipeline) -> Result<SubmittedJob> {
        let job = self.client.jobs.submit(pipeline).await?;
        tracing::info!(job = %job.name, "Pipeline job submitted");
        Ok(job)
    }

    /// Create the cluster unless a compute with its name is listed.
    async fn ensure_compute(&self) -> Result<(ComputeInfo, bool)> {
        let cluster = &self.blueprint.cluster;
        tracing::info!(cluster = %cluster.name, "Creating compute cluster");

        let exists = self
            .client
            .compute
            .list()
            .await?
            .iter()
            .any(|c| c.name == cluster.name);

        let created = if exists {
            tracing::info!(cluster = %cluster.name, "Compute cluster already exists");
            false
        } else {
            self.client.compute.create_or_update(cluster).await?;
            tracing::info!(cluster = %cluster.name, "Compute cluster created");
            true
        };

        let info = self.client.compute.get(&cluster.name).await?;
        Ok((info, created))
    }

    /// Grant the blueprint role over the storage account; an existing grant is not an error.
    async fn grant_storage_role(
        &self,
        account_name: &str,
        principal_id: &str,
    ) -> Result<RoleOutcome> {
        let request = RoleAssignmentRequest::new(
            self.settings.storage_account_scope(account_name),
            self.settings.role_definition_id(&self.blueprint.role),
            principal_id,
            self.blueprint.principal_type,
        );

        match self.client.authorization.create(&request).await {
            Ok(assignment) => {
                tracing::info!(id = %assignment.id, "Role assignment created");
                Ok(RoleOutcome::Created(assignment))
            }
            Err(e) if e.is_already_exists() => {
                tracing::info!("Role assignment already exists. Skipping creation.");
                Ok(RoleOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn register_environments(&self) -> Result<EnvironmentCatalog> {
        tracing::info!("Creating environments");
        let mut catalog = EnvironmentCatalog::new();

        for env in &self.blueprint.environments {
            let spec = EnvironmentSpec {
                build_context: self.layout.resolve(&env.build_context),
                ..env.clone()
            };
            let registered = self.client.environments.create_or_update(&spec).await?;
            tracing::info!(
                environment = %registered.name,
                version = %registered.version,
                "Environment created/updated"
            );
            catalog.insert(registered);
        }

        Ok(catalog)
    }
}
