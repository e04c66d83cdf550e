//! In-memory platform.
//!
//! Keeps compute, role, environment and job state in process so the whole
//! provisioning flow can run without a cloud account. Every call is recorded.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    ComputeApi, DatastoreApi, EnvironmentApi, JobApi, MlClient, PlatformResult, RoleAssignmentApi,
};
use crate::error::PlatformError;
use crate::pipeline::Pipeline;
use crate::resources::{
    ComputeCluster, ComputeInfo, Datastore, EnvironmentSpec, IdentityType, ManagedIdentity,
    RegisteredEnvironment, RoleAssignment, RoleAssignmentRequest, SubmittedJob,
};

/// Mount point under which rendered job commands place step outputs.
pub const JOB_ROOT: &str = "/mnt/azureml/jobs";

#[derive(Debug, Default)]
struct State {
    calls: Vec<String>,
    computes: BTreeMap<String, ComputeInfo>,
    compute_creations: usize,
    datastores: BTreeMap<String, Datastore>,
    role_assignments: Vec<RoleAssignmentRequest>,
    environment_versions: HashMap<String, u32>,
    jobs: Vec<RecordedJob>,
}

/// A pipeline accepted by [`InMemoryPlatform`], with each step's command rendered.
#[derive(Debug, Clone)]
pub struct RecordedJob {
    /// Job name
    pub name: String,
    /// Submitted pipeline
    pub pipeline: Pipeline,
    /// Step name → command with placeholders replaced by mount paths
    pub commands: BTreeMap<String, String>,
}

/// A platform whose state lives in memory.
#[derive(Debug, Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    /// Create an empty platform with the default blob datastore registered.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let platform = Self::default();
        platform.add_datastore(Datastore {
            name: "workspaceblobstore".into(),
            account_name: "edgemlstorage".into(),
            container_name: Some("azureml-blobstore".into()),
        });
        Arc::new(platform)
    }

    /// Register a datastore.
    pub fn add_datastore(&self, datastore: Datastore) {
        self.state
            .lock()
            .datastores
            .insert(datastore.name.clone(), datastore);
    }

    /// Insert a compute target as if it had been created out of band.
    pub fn add_compute(&self, compute: ComputeInfo) {
        self.state
            .lock()
            .computes
            .insert(compute.name.clone(), compute);
    }

    /// Build a client whose services are all backed by this platform.
    #[must_use]
    pub fn client(self: &Arc<Self>) -> MlClient {
        MlClient {
            compute: self.clone(),
            datastores: self.clone(),
            authorization: self.clone(),
            environments: self.clone(),
            jobs: self.clone(),
        }
    }

    /// Every call made so far, as `service.operation name`.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of compute creations performed.
    #[must_use]
    pub fn compute_creations(&self) -> usize {
        self.state.lock().compute_creations
    }

    /// Role assignments in place.
    #[must_use]
    pub fn role_assignments(&self) -> Vec<RoleAssignmentRequest> {
        self.state.lock().role_assignments.clone()
    }

    /// Jobs submitted so far.
    #[must_use]
    pub fn jobs(&self) -> Vec<RecordedJob> {
        self.state.lock().jobs.clone()
    }

    fn record(&self, call: String) {
        tracing::debug!(%call, "In-memory platform call");
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl ComputeApi for InMemoryPlatform {
    async fn list(&self) -> PlatformResult<Vec<ComputeInfo>> {
        self.record("compute.list".into());
        Ok(self.state.lock().computes.values().cloned().collect())
    }

    async fn get(&self, name: &str) -> PlatformResult<ComputeInfo> {
        self.record(format!("compute.get {name}"));
        self.state
            .lock()
            .computes
            .get(name)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound {
                resource: "Compute",
                name: name.to_string(),
            })
    }

    async fn create_or_update(&self, cluster: &ComputeCluster) -> PlatformResult<ComputeInfo> {
        self.record(format!("compute.create_or_update {}", cluster.name));
        let mut state = self.state.lock();

        let identity = match cluster.identity {
            IdentityType::SystemAssigned => {
                let existing = state
                    .computes
                    .get(&cluster.name)
                    .and_then(|c| c.identity.clone());
                Some(existing.unwrap_or_else(|| ManagedIdentity {
                    identity_type: IdentityType::SystemAssigned,
                    principal_id: Some(uuid::Uuid::new_v4().to_string()),
                    tenant_id: Some(uuid::Uuid::nil().to_string()),
                }))
            }
            IdentityType::None => None,
        };

        let info = ComputeInfo {
            name: cluster.name.clone(),
            provisioning_state: Some("Succeeded".into()),
            identity,
        };
        state.computes.insert(cluster.name.clone(), info.clone());
        state.compute_creations += 1;
        Ok(info)
    }
}

#[async_trait]
impl DatastoreApi for InMemoryPlatform {
    async fn get(&self, name: &str) -> PlatformResult<Datastore> {
        self.record(format!("datastores.get {name}"));
        self.state
            .lock()
            .datastores
            .get(name)
            .cloned()
            .ok_or_else(|| PlatformError::NotFound {
                resource: "Datastore",
                name: name.to_string(),
            })
    }
}

#[async_trait]
impl RoleAssignmentApi for InMemoryPlatform {
    async fn create(&self, request: &RoleAssignmentRequest) -> PlatformResult<RoleAssignment> {
        self.record(format!("authorization.create {}", request.name));
        let mut state = self.state.lock();

        let duplicate = state.role_assignments.iter().any(|existing| {
            existing.scope == request.scope
                && existing.role_definition_id == request.role_definition_id
                && existing.principal_id == request.principal_id
        });
        if duplicate {
            return Err(PlatformError::AlreadyExists {
                resource: "Role assignment",
                name: request.name.clone(),
            });
        }

        state.role_assignments.push(request.clone());
        Ok(RoleAssignment {
            id: format!(
                "{}/providers/Microsoft.Authorization/roleAssignments/{}",
                request.scope, request.name
            ),
            name: request.name.clone(),
        })
    }
}

#[async_trait]
impl EnvironmentApi for InMemoryPlatform {
    async fn create_or_update(
        &self,
        spec: &EnvironmentSpec,
    ) -> PlatformResult<RegisteredEnvironment> {
        self.record(format!("environments.create_or_update {}", spec.name));
        let mut state = self.state.lock();
        let version = state
            .environment_versions
            .entry(spec.name.clone())
            .or_insert(0);
        *version += 1;
        Ok(RegisteredEnvironment::new(
            spec.name.clone(),
            version.to_string(),
        ))
    }
}

#[async_trait]
impl JobApi for InMemoryPlatform {
    async fn submit(&self, pipeline: &Pipeline) -> PlatformResult<SubmittedJob> {
        self.record(format!("jobs.submit {}", pipeline.name));

        let mut commands = BTreeMap::new();
        for step in &pipeline.steps {
            let inputs = step
                .inputs
                .iter()
                .map(|(name, source)| (name.clone(), mount_path(&source.step, &source.port)))
                .collect();
            let outputs = step
                .component
                .outputs
                .keys()
                .map(|port| (port.clone(), mount_path(&step.name, port)))
                .collect();
            let command = step
                .component
                .command
                .render(&inputs, &outputs)
                .map_err(|e| PlatformError::request("jobs.submit", e.to_string()))?;
            commands.insert(step.name.clone(), command);
        }

        let mut state = self.state.lock();
        let name = format!("{}-{}", pipeline.name, state.jobs.len() + 1);
        state.jobs.push(RecordedJob {
            name: name.clone(),
            pipeline: pipeline.clone(),
            commands,
        });

        Ok(SubmittedJob {
            name,
            studio_url: None,
            status: Some("NotStarted".into()),
        })
    }
}

fn mount_path(step: &str, port: &str) -> String {
    format!("{JOB_ROOT}/{step}/outputs/{port}")
}
