//! Resource Manager services against a mock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use edgeml_azure::arm::{ArmClient, ArmOptions};
use edgeml_azure::authorization::ArmAuthorization;
use edgeml_azure::compute::ArmCompute;
use edgeml_azure::credential::StaticToken;
use edgeml_azure::datastore::ArmDatastores;
use edgeml_core::PlatformError;
use edgeml_core::platform::{ComputeApi, DatastoreApi, RoleAssignmentApi};
use edgeml_core::resources::{
    ComputeCluster, IdentityType, PrincipalType, RoleAssignmentRequest,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WORKSPACE: &str =
    "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.MachineLearningServices/workspaces/ws";

fn client(server: &MockServer) -> ArmClient {
    ArmClient::new(
        Arc::new(StaticToken::new("test-token")),
        ArmOptions::default()
            .with_endpoint(server.uri())
            .with_polling(Duration::from_millis(5), 5),
    )
    .unwrap()
}

fn cluster() -> ComputeCluster {
    ComputeCluster {
        name: "cpu-cluster".into(),
        size: "Standard_DS3_v2".into(),
        min_instances: 0,
        max_instances: 4,
        idle_time_before_scale_down: 120,
        identity: IdentityType::SystemAssigned,
    }
}

#[tokio::test]
async fn test_list_computes_follows_next_link() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{WORKSPACE}/computes")))
        .and(query_param("api-version", "2024-04-01"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "name": "gpu-cluster" }],
            "nextLink": format!("{}/page2", server.uri())
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "name": "cpu-cluster" }]
        })))
        .mount(&server)
        .await;

    let computes = ArmCompute::new(client(&server), WORKSPACE)
        .list()
        .await
        .unwrap();
    let names: Vec<_> = computes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["gpu-cluster", "cpu-cluster"]);
}

#[tokio::test]
async fn test_get_missing_compute_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{WORKSPACE}/computes/cpu-cluster")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "ResourceNotFound", "message": "not here" }
        })))
        .mount(&server)
        .await;

    let err = ArmCompute::new(client(&server), WORKSPACE)
        .get("cpu-cluster")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PlatformError::NotFound {
            resource: "Compute",
            name: "cpu-cluster".into()
        }
    );
}

#[tokio::test]
async fn test_create_compute_polls_async_operation() {
    let server = MockServer::start().await;
    let operation = format!("{}/operations/op-1", server.uri());

    Mock::given(method("GET"))
        .and(path(WORKSPACE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "location": "westeurope" })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{WORKSPACE}/computes/cpu-cluster")))
        .and(body_partial_json(json!({
            "location": "westeurope",
            "identity": { "type": "SystemAssigned" },
            "properties": { "computeType": "AmlCompute" }
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Azure-AsyncOperation", operation.as_str())
                .set_body_json(json!({ "name": "cpu-cluster" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "InProgress" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "Succeeded" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{WORKSPACE}/computes/cpu-cluster")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "cpu-cluster",
            "identity": { "type": "SystemAssigned", "principalId": "principal-1" },
            "properties": { "provisioningState": "Succeeded" }
        })))
        .mount(&server)
        .await;

    let info = ArmCompute::new(client(&server), WORKSPACE)
        .create_or_update(&cluster())
        .await
        .unwrap();
    assert_eq!(info.principal_id(), Some("principal-1"));
}

#[tokio::test]
async fn test_failed_operation_is_reported() {
    let server = MockServer::start().await;
    let operation = format!("{}/operations/op-2", server.uri());

    Mock::given(method("GET"))
        .and(path(WORKSPACE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "location": "westeurope" })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{WORKSPACE}/computes/cpu-cluster")))
        .respond_with(
            ResponseTemplate::new(202).insert_header("Azure-AsyncOperation", operation.as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Failed",
            "error": { "code": "QuotaExceeded", "message": "no cores left" }
        })))
        .mount(&server)
        .await;

    let err = ArmCompute::new(client(&server), WORKSPACE)
        .create_or_update(&cluster())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("QuotaExceeded: no cores left"));
}

#[tokio::test]
async fn test_operation_that_never_finishes_times_out() {
    let server = MockServer::start().await;
    let operation = format!("{}/operations/op-3", server.uri());

    Mock::given(method("GET"))
        .and(path(WORKSPACE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "location": "westeurope" })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{WORKSPACE}/computes/cpu-cluster")))
        .respond_with(
            ResponseTemplate::new(202).insert_header("Azure-AsyncOperation", operation.as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/op-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "InProgress" })))
        .expect(5)
        .mount(&server)
        .await;

    let err = ArmCompute::new(client(&server), WORKSPACE)
        .create_or_update(&cluster())
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::Timeout { .. }));
}

#[tokio::test]
async fn test_datastore_account_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{WORKSPACE}/datastores/workspaceblobstore")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "workspaceblobstore",
            "properties": {
                "datastoreType": "AzureBlob",
                "accountName": "edgestorage",
                "containerName": "azureml-blobstore"
            }
        })))
        .mount(&server)
        .await;

    let datastore = ArmDatastores::new(client(&server), WORKSPACE)
        .get("workspaceblobstore")
        .await
        .unwrap();
    assert_eq!(datastore.account_name, "edgestorage");
    assert_eq!(datastore.container_name.as_deref(), Some("azureml-blobstore"));
}

#[tokio::test]
async fn test_role_assignment_created() {
    let server = MockServer::start().await;
    let scope = "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/edgestorage";
    let request = RoleAssignmentRequest::new(
        scope,
        "/subscriptions/sub/providers/Microsoft.Authorization/roleDefinitions/ba92f5b4-2d11-453d-a403-e96b0029c9fe",
        "principal-1",
        PrincipalType::ServicePrincipal,
    );
    let assignment_path = format!(
        "{scope}/providers/Microsoft.Authorization/roleAssignments/{}",
        request.name
    );

    Mock::given(method("PUT"))
        .and(path(assignment_path.as_str()))
        .and(query_param("api-version", "2022-04-01"))
        .and(body_partial_json(json!({
            "properties": {
                "principalId": "principal-1",
                "principalType": "ServicePrincipal"
            }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": assignment_path,
            "name": request.name
        })))
        .mount(&server)
        .await;

    let created = ArmAuthorization::new(client(&server))
        .create(&request)
        .await
        .unwrap();
    assert_eq!(created.name, request.name);
}

#[tokio::test]
async fn test_existing_role_assignment_is_already_exists() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": {
                "code": "RoleAssignmentExists",
                "message": "The role assignment already exists."
            }
        })))
        .mount(&server)
        .await;

    let request = RoleAssignmentRequest::new(
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/x",
        "/role",
        "principal-1",
        PrincipalType::ServicePrincipal,
    );
    let err = ArmAuthorization::new(client(&server))
        .create(&request)
        .await
        .unwrap_err();
    assert!(err.is_already_exists());
}

#[tokio::test]
async fn test_forbidden_is_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "AuthorizationFailed", "message": "no access" }
        })))
        .mount(&server)
        .await;

    let err = ArmDatastores::new(client(&server), WORKSPACE)
        .get("workspaceblobstore")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        PlatformError::Authentication("AuthorizationFailed: no access".into())
    );
}
