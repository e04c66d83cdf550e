//! Platform resource models.
//!
//! Desired-state specs (`ComputeCluster`, `EnvironmentSpec`, `RoleAssignmentRequest`)
//! are what edgeml asks for; the other types mirror what the platform reports back.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Managed identity kinds a compute cluster can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityType {
    /// Identity created and owned by the platform for this resource
    SystemAssigned,
    /// No managed identity
    None,
}

impl IdentityType {
    /// Wire name of the identity type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SystemAssigned => "SystemAssigned",
            Self::None => "None",
        }
    }
}

/// Desired state of an autoscaling compute cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeCluster {
    /// Cluster name, unique within the workspace
    pub name: String,
    /// VM size, e.g. `Standard_DS3_v2`
    pub size: String,
    /// Lower bound of the node count
    pub min_instances: u32,
    /// Upper bound of the node count
    pub max_instances: u32,
    /// Idle time before nodes are released, in seconds
    pub idle_time_before_scale_down: u64,
    /// Managed identity to attach
    pub identity: IdentityType,
}

impl ComputeCluster {
    /// Idle timeout as an ISO-8601 duration (`PT120S`).
    #[must_use]
    pub fn idle_timeout_iso8601(&self) -> String {
        format!("PT{}S", self.idle_time_before_scale_down)
    }
}

/// Managed identity attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedIdentity {
    /// Identity type
    pub identity_type: IdentityType,
    /// Object id of the service principal
    pub principal_id: Option<String>,
    /// Tenant of the service principal
    pub tenant_id: Option<String>,
}

/// A compute target as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeInfo {
    /// Compute name
    pub name: String,
    /// Provisioning state, when reported
    pub provisioning_state: Option<String>,
    /// Managed identity, when one is attached
    pub identity: Option<ManagedIdentity>,
}

impl ComputeInfo {
    /// Principal id of the attached identity.
    #[must_use]
    pub fn principal_id(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .and_then(|identity| identity.principal_id.as_deref())
    }
}

/// A workspace datastore backed by a storage account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Datastore {
    /// Datastore name
    pub name: String,
    /// Backing storage account
    pub account_name: String,
    /// Blob container, when the datastore is blob-backed
    pub container_name: Option<String>,
}

/// Kind of principal a role is granted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrincipalType {
    /// Application or managed identity
    ServicePrincipal,
}

impl PrincipalType {
    /// Wire name of the principal type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServicePrincipal => "ServicePrincipal",
        }
    }
}

/// A request to bind a principal to a role over a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignmentRequest {
    /// Resource id the grant applies to
    pub scope: String,
    /// Assignment name (a GUID)
    pub name: String,
    /// Fully qualified role definition id
    pub role_definition_id: String,
    /// Principal receiving the role
    pub principal_id: String,
    /// Kind of principal
    pub principal_type: PrincipalType,
}

impl RoleAssignmentRequest {
    /// Create a request keyed by a freshly generated assignment name.
    #[must_use]
    pub fn new(
        scope: impl Into<String>,
        role_definition_id: impl Into<String>,
        principal_id: impl Into<String>,
        principal_type: PrincipalType,
    ) -> Self {
        Self {
            scope: scope.into(),
            name: uuid::Uuid::new_v4().to_string(),
            role_definition_id: role_definition_id.into(),
            principal_id: principal_id.into(),
            principal_type,
        }
    }
}

/// A created role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Full resource id
    pub id: String,
    /// Assignment name
    pub name: String,
}

/// Result of ensuring a role assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleOutcome {
    /// A new assignment was created
    Created(RoleAssignment),
    /// An equivalent assignment was already in place
    AlreadyExists,
}

/// A build environment registered from a local build context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    /// Environment name
    pub name: String,
    /// Human readable description
    pub description: String,
    /// Directory holding the Dockerfile and its context
    pub build_context: PathBuf,
}

impl EnvironmentSpec {
    /// Create an environment spec.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        build_context: impl Into<PathBuf>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            build_context: build_context.into(),
        }
    }
}

/// An environment version assigned by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegisteredEnvironment {
    /// Environment name
    pub name: String,
    /// Platform-assigned version
    pub version: String,
}

impl RegisteredEnvironment {
    /// Create a registered environment.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Parse a `name:version` reference.
    #[must_use]
    pub fn parse(reference: &str) -> Option<Self> {
        let (name, version) = reference.rsplit_once(':')?;
        if name.is_empty() || version.is_empty() {
            return None;
        }
        Some(Self::new(name, version))
    }
}

impl fmt::Display for RegisteredEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.version)
    }
}

/// Latest registered version of each environment, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvironmentCatalog {
    entries: BTreeMap<String, RegisteredEnvironment>,
}

impl EnvironmentCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a registered environment, replacing an older version.
    pub fn insert(&mut self, env: RegisteredEnvironment) {
        self.entries.insert(env.name.clone(), env);
    }

    /// Look up an environment by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredEnvironment> {
        self.entries.get(name)
    }

    /// Number of environments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate environments in name order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredEnvironment> {
        self.entries.values()
    }
}

impl FromIterator<RegisteredEnvironment> for EnvironmentCatalog {
    fn from_iter<T: IntoIterator<Item = RegisteredEnvironment>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for env in iter {
            catalog.insert(env);
        }
        catalog
    }
}

/// A submitted pipeline job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedJob {
    /// Job name assigned by the platform
    pub name: String,
    /// Link to the job in the platform UI
    pub studio_url: Option<String>,
    /// Initial status
    pub status: Option<String>,
}
