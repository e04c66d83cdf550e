//! Role assignments through `Microsoft.Authorization`.

use async_trait::async_trait;
use edgeml_core::platform::{PlatformResult, RoleAssignmentApi};
use edgeml_core::resources::{RoleAssignment, RoleAssignmentRequest};
use serde::{Deserialize, Serialize};

use crate::arm::{ArmClient, AUTHORIZATION_API_VERSION, Target};

#[derive(Debug, Serialize)]
struct RoleAssignmentBody<'a> {
    properties: RoleAssignmentProperties<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RoleAssignmentProperties<'a> {
    role_definition_id: &'a str,
    principal_id: &'a str,
    principal_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct RoleAssignmentResource {
    id: String,
    name: String,
}

/// Role assignment creation.
///
/// Resource Manager answers `409 RoleAssignmentExists` when the same principal
/// already holds the role on the scope, which surfaces as `AlreadyExists`.
#[derive(Debug, Clone)]
pub struct ArmAuthorization {
    arm: ArmClient,
}

impl ArmAuthorization {
    /// Create the service.
    #[must_use]
    pub const fn new(arm: ArmClient) -> Self {
        Self { arm }
    }
}

#[async_trait]
impl RoleAssignmentApi for ArmAuthorization {
    async fn create(&self, request: &RoleAssignmentRequest) -> PlatformResult<RoleAssignment> {
        let body = RoleAssignmentBody {
            properties: RoleAssignmentProperties {
                role_definition_id: &request.role_definition_id,
                principal_id: &request.principal_id,
                principal_type: request.principal_type.as_str(),
            },
        };
        let path = format!(
            "{}/providers/Microsoft.Authorization/roleAssignments/{}",
            request.scope, request.name
        );

        let created: RoleAssignmentResource = self
            .arm
            .put(
                Target::new("Role assignment", &request.name),
                &path,
                AUTHORIZATION_API_VERSION,
                &body,
            )
            .await?;

        Ok(RoleAssignment {
            id: created.id,
            name: created.name,
        })
    }
}
