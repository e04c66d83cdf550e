//! Datastore lookups.

use async_trait::async_trait;
use edgeml_core::PlatformError;
use edgeml_core::platform::{DatastoreApi, PlatformResult};
use edgeml_core::resources::Datastore;
use serde::Deserialize;

use crate::arm::{ArmClient, ML_API_VERSION, Target};

#[derive(Debug, Deserialize)]
struct DatastoreResource {
    name: String,
    properties: DatastoreProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatastoreProperties {
    #[serde(default)]
    account_name: Option<String>,
    #[serde(default)]
    container_name: Option<String>,
}

/// Datastore reads for one workspace.
#[derive(Debug, Clone)]
pub struct ArmDatastores {
    arm: ArmClient,
    workspace_id: String,
}

impl ArmDatastores {
    /// Operate on the workspace with the given ARM id.
    #[must_use]
    pub fn new(arm: ArmClient, workspace_id: impl Into<String>) -> Self {
        Self {
            arm,
            workspace_id: workspace_id.into(),
        }
    }
}

#[async_trait]
impl DatastoreApi for ArmDatastores {
    async fn get(&self, name: &str) -> PlatformResult<Datastore> {
        let resource: DatastoreResource = self
            .arm
            .get(
                Target::new("Datastore", name),
                &format!("{}/datastores/{name}", self.workspace_id),
                ML_API_VERSION,
            )
            .await?;

        // Only storage-backed datastores carry an account.
        let account_name = resource.properties.account_name.ok_or_else(|| {
            PlatformError::serialization(
                format!("Datastore '{name}'"),
                "datastore has no storage account",
            )
        })?;

        Ok(Datastore {
            name: resource.name,
            account_name,
            container_name: resource.properties.container_name,
        })
    }
}
