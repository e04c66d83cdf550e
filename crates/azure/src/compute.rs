//! Compute clusters through `Microsoft.MachineLearningServices/workspaces/computes`.

use async_trait::async_trait;
use edgeml_core::platform::{ComputeApi, PlatformResult};
use edgeml_core::resources::{ComputeCluster, ComputeInfo, IdentityType, ManagedIdentity};
use serde::{Deserialize, Serialize};

use crate::arm::{ArmClient, ML_API_VERSION, Target};

const COMPUTE: &str = "Compute";
const WORKSPACE: &str = "Workspace";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputeList {
    #[serde(default)]
    value: Vec<ComputeResource>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ComputeResource {
    name: String,
    #[serde(default)]
    identity: Option<IdentityResource>,
    #[serde(default)]
    properties: Option<ComputeStatus>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityResource {
    #[serde(rename = "type")]
    identity_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    principal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputeStatus {
    #[serde(default)]
    provisioning_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WorkspaceResource {
    location: String,
}

#[derive(Debug, Serialize)]
struct ComputeBody {
    location: String,
    identity: IdentityResource,
    properties: AmlComputeBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AmlComputeBody {
    compute_type: &'static str,
    properties: AmlComputeProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AmlComputeProperties {
    vm_size: String,
    vm_priority: &'static str,
    scale_settings: ScaleSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScaleSettings {
    min_node_count: u32,
    max_node_count: u32,
    node_idle_time_before_scale_down: String,
}

impl From<ComputeResource> for ComputeInfo {
    fn from(resource: ComputeResource) -> Self {
        Self {
            name: resource.name,
            provisioning_state: resource.properties.and_then(|p| p.provisioning_state),
            identity: resource.identity.map(|identity| ManagedIdentity {
                identity_type: if identity.identity_type.contains("SystemAssigned") {
                    IdentityType::SystemAssigned
                } else {
                    IdentityType::None
                },
                principal_id: identity.principal_id,
                tenant_id: identity.tenant_id,
            }),
        }
    }
}

/// Compute operations for one workspace.
#[derive(Debug, Clone)]
pub struct ArmCompute {
    arm: ArmClient,
    workspace_id: String,
}

impl ArmCompute {
    /// Operate on the workspace with the given ARM id.
    #[must_use]
    pub fn new(arm: ArmClient, workspace_id: impl Into<String>) -> Self {
        Self {
            arm,
            workspace_id: workspace_id.into(),
        }
    }

    fn compute_path(&self, name: &str) -> String {
        format!("{}/computes/{name}", self.workspace_id)
    }

    fn request_body(cluster: &ComputeCluster, location: String) -> ComputeBody {
        ComputeBody {
            location,
            identity: IdentityResource {
                identity_type: cluster.identity.as_str().to_string(),
                principal_id: None,
                tenant_id: None,
            },
            properties: AmlComputeBody {
                compute_type: "AmlCompute",
                properties: AmlComputeProperties {
                    vm_size: cluster.size.clone(),
                    vm_priority: "Dedicated",
                    scale_settings: ScaleSettings {
                        min_node_count: cluster.min_instances,
                        max_node_count: cluster.max_instances,
                        node_idle_time_before_scale_down: cluster.idle_timeout_iso8601(),
                    },
                },
            },
        }
    }
}

#[async_trait]
impl ComputeApi for ArmCompute {
    async fn list(&self) -> PlatformResult<Vec<ComputeInfo>> {
        let target = Target::new(COMPUTE, "*");
        let mut page: ComputeList = self
            .arm
            .get(
                target,
                &format!("{}/computes", self.workspace_id),
                ML_API_VERSION,
            )
            .await?;

        let mut computes: Vec<ComputeInfo> = Vec::new();
        loop {
            computes.extend(page.value.into_iter().map(ComputeInfo::from));
            match page.next_link {
                Some(next) => page = self.arm.get_url(target, &next).await?,
                None => break,
            }
        }
        tracing::debug!(count = computes.len(), "Listed compute targets");
        Ok(computes)
    }

    async fn get(&self, name: &str) -> PlatformResult<ComputeInfo> {
        let resource: ComputeResource = self
            .arm
            .get(
                Target::new(COMPUTE, name),
                &self.compute_path(name),
                ML_API_VERSION,
            )
            .await?;
        Ok(resource.into())
    }

    async fn create_or_update(&self, cluster: &ComputeCluster) -> PlatformResult<ComputeInfo> {
        let workspace: WorkspaceResource = self
            .arm
            .get(
                Target::new(WORKSPACE, &self.workspace_id),
                &self.workspace_id,
                ML_API_VERSION,
            )
            .await?;

        let body = Self::request_body(cluster, workspace.location);
        let resource: ComputeResource = self
            .arm
            .put_and_wait(
                Target::new(COMPUTE, &cluster.name),
                &self.compute_path(&cluster.name),
                ML_API_VERSION,
                &body,
            )
            .await?;
        Ok(resource.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let cluster = ComputeCluster {
            name: "cpu-cluster".into(),
            size: "Standard_DS3_v2".into(),
            min_instances: 0,
            max_instances: 4,
            idle_time_before_scale_down: 120,
            identity: IdentityType::SystemAssigned,
        };
        let body = serde_json::to_value(ArmCompute::request_body(&cluster, "westeurope".into()))
            .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "location": "westeurope",
                "identity": { "type": "SystemAssigned" },
                "properties": {
                    "computeType": "AmlCompute",
                    "properties": {
                        "vmSize": "Standard_DS3_v2",
                        "vmPriority": "Dedicated",
                        "scaleSettings": {
                            "minNodeCount": 0,
                            "maxNodeCount": 4,
                            "nodeIdleTimeBeforeScaleDown": "PT120S"
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn test_resource_conversion() {
        let resource: ComputeResource = serde_json::from_value(serde_json::json!({
            "name": "cpu-cluster",
            "identity": {
                "type": "SystemAssigned",
                "principalId": "11111111-2222-3333-4444-555555555555",
                "tenantId": "tenant"
            },
            "properties": { "provisioningState": "Succeeded", "computeType": "AmlCompute" }
        }))
        .unwrap();

        let info = ComputeInfo::from(resource);
        assert_eq!(info.principal_id(), Some("11111111-2222-3333-4444-555555555555"));
        assert_eq!(info.provisioning_state.as_deref(), Some("Succeeded"));
    }

    #[test]
    fn test_resource_without_identity() {
        let resource: ComputeResource =
            serde_json::from_value(serde_json::json!({ "name": "gpu" })).unwrap();
        assert_eq!(ComputeInfo::from(resource).principal_id(), None);
    }
}
