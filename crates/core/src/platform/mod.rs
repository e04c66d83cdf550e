//! Platform service seams.
//!
//! Each trait covers one opaque service of the managed ML platform. Production
//! implementations live in `edgeml-azure`; [`memory::InMemoryPlatform`] backs
//! tests and offline runs.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::pipeline::Pipeline;
use crate::resources::{
    ComputeCluster, ComputeInfo, Datastore, EnvironmentSpec, RegisteredEnvironment,
    RoleAssignment, RoleAssignmentRequest, SubmittedJob,
};

/// Result type for platform calls.
pub type PlatformResult<T> = std::result::Result<T, PlatformError>;

/// Compute provisioning.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// List compute targets in the workspace.
    async fn list(&self) -> PlatformResult<Vec<ComputeInfo>>;

    /// Read a compute target.
    async fn get(&self, name: &str) -> PlatformResult<ComputeInfo>;

    /// Create or update a cluster and wait for the operation to finish.
    async fn create_or_update(&self, cluster: &ComputeCluster) -> PlatformResult<ComputeInfo>;
}

/// Workspace datastores.
#[async_trait]
pub trait DatastoreApi: Send + Sync {
    /// Read a datastore.
    async fn get(&self, name: &str) -> PlatformResult<Datastore>;
}

/// Identity and role assignment management.
#[async_trait]
pub trait RoleAssignmentApi: Send + Sync {
    /// Create a role assignment.
    ///
    /// An equivalent existing assignment yields [`PlatformError::AlreadyExists`].
    async fn create(&self, request: &RoleAssignmentRequest) -> PlatformResult<RoleAssignment>;
}

/// Environment registration from local build contexts.
#[async_trait]
pub trait EnvironmentApi: Send + Sync {
    /// Register a new version of an environment.
    async fn create_or_update(&self, spec: &EnvironmentSpec)
    -> PlatformResult<RegisteredEnvironment>;
}

/// Pipeline job submission.
#[async_trait]
pub trait JobApi: Send + Sync {
    /// Submit a pipeline as a job.
    async fn submit(&self, pipeline: &Pipeline) -> PlatformResult<SubmittedJob>;
}

/// Handles to every platform service for one workspace.
#[derive(Clone)]
pub struct MlClient {
    /// Compute provisioning
    pub compute: Arc<dyn ComputeApi>,
    /// Datastores
    pub datastores: Arc<dyn DatastoreApi>,
    /// Role assignments
    pub authorization: Arc<dyn RoleAssignmentApi>,
    /// Environments
    pub environments: Arc<dyn EnvironmentApi>,
    /// Jobs
    pub jobs: Arc<dyn JobApi>,
}

impl fmt::Debug for MlClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MlClient").finish_non_exhaustive()
    }
}
