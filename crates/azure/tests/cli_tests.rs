//! Azure CLI services against a fake `az` executable.

#![cfg(unix)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use edgeml_azure::cli::AzCli;
use edgeml_azure::credential::{AzureCliCredential, TokenCredential};
use edgeml_azure::environment::CliEnvironments;
use edgeml_azure::job::CliJobs;
use edgeml_core::blueprint::{Blueprint, GCC_ENV, ONNX2C_ENV, PYTORCH_ENV};
use edgeml_core::platform::{EnvironmentApi, JobApi};
use edgeml_core::resources::{EnvironmentCatalog, EnvironmentSpec, RegisteredEnvironment};
use edgeml_core::{PlatformError, WorkspaceSettings};
use tempfile::TempDir;

/// Write an `az` stand-in that logs its arguments and job files, then prints `stdout`.
fn fake_az(dir: &Path, stdout: &str, exit_code: i32) -> PathBuf {
    let script = dir.join("az");
    let log = dir.join("args.log");
    let jobs = dir.join("job.yml");
    std::fs::write(
        &script,
        format!(
            "#!/bin/sh\n\
             echo \"$@\" >> '{log}'\n\
             prev=''\n\
             for arg in \"$@\"; do\n\
               if [ \"$prev\" = '--file' ]; then cp \"$arg\" '{jobs}'; fi\n\
               prev=\"$arg\"\n\
             done\n\
             cat <<'JSON'\n{stdout}\nJSON\n\
             echo 'fake az stderr' >&2\n\
             exit {exit_code}\n",
            log = log.display(),
            jobs = jobs.display(),
        ),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    script
}

fn logged_args(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("args.log")).unwrap()
}

fn cli(program: &Path) -> AzCli {
    AzCli::new()
        .with_program(program)
        .for_workspace(&WorkspaceSettings::new("sub", "rg", "ws"))
}

#[tokio::test]
async fn test_environment_registration() {
    let dir = TempDir::new().unwrap();
    let az = fake_az(dir.path(), r#"{"name": "gcc-env", "version": "7"}"#, 0);

    let registered = CliEnvironments::new(cli(&az))
        .create_or_update(&EnvironmentSpec::new(
            "gcc-env",
            "/work/environments/gcc",
            "Environment for C compilation and testing",
        ))
        .await
        .unwrap();

    assert_eq!(registered.to_string(), "gcc-env:7");
    let args = logged_args(dir.path());
    assert!(args.starts_with("ml environment create --name gcc-env"));
    assert!(args.contains("--build-context /work/environments/gcc"));
    assert!(args.contains("--workspace-name ws --output json"));
}

#[tokio::test]
async fn test_failing_command_reports_stderr() {
    let dir = TempDir::new().unwrap();
    let az = fake_az(dir.path(), "{}", 1);

    let err = CliEnvironments::new(cli(&az))
        .create_or_update(&EnvironmentSpec::new("gcc-env", "/work", "gcc"))
        .await
        .unwrap_err();

    match err {
        PlatformError::Cli { command, stderr } => {
            assert!(command.starts_with("az ml environment create"));
            assert_eq!(stderr, "fake az stderr");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unparseable_output_is_serialization_error() {
    let dir = TempDir::new().unwrap();
    let az = fake_az(dir.path(), "not json", 0);

    let err = CliEnvironments::new(cli(&az))
        .create_or_update(&EnvironmentSpec::new("gcc-env", "/work", "gcc"))
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::Serialization { .. }));
}

#[tokio::test]
async fn test_job_submission_writes_pipeline_yaml() {
    let dir = TempDir::new().unwrap();
    let az = fake_az(
        dir.path(),
        r#"{
            "name": "brave_lemon_123",
            "status": "NotStarted",
            "services": { "Studio": { "endpoint": "https://ml.azure.com/runs/brave_lemon_123" } }
        }"#,
        0,
    );

    let catalog: EnvironmentCatalog = [
        RegisteredEnvironment::new(PYTORCH_ENV, "1"),
        RegisteredEnvironment::new(ONNX2C_ENV, "1"),
        RegisteredEnvironment::new(GCC_ENV, "1"),
    ]
    .into_iter()
    .collect();
    let pipeline = Blueprint::default().pipeline(&catalog).unwrap();

    let job = CliJobs::new(cli(&az), "/work/project")
        .submit(&pipeline)
        .await
        .unwrap();

    assert_eq!(job.name, "brave_lemon_123");
    assert_eq!(
        job.studio_url.as_deref(),
        Some("https://ml.azure.com/runs/brave_lemon_123")
    );
    assert!(logged_args(dir.path()).starts_with("ml job create --file "));

    let yaml = std::fs::read_to_string(dir.path().join("job.yml")).unwrap();
    assert!(yaml.contains("type: pipeline"));
    assert!(yaml.contains("code: /work/project/src/pytorch_train"));
}

#[tokio::test]
async fn test_cli_credential_reads_access_token() {
    let dir = TempDir::new().unwrap();
    let az = fake_az(
        dir.path(),
        r#"{"accessToken": "eyJ0eXAi", "expiresOn": "2026-10-19 12:00:00.000000", "tokenType": "Bearer"}"#,
        0,
    );

    let token = AzureCliCredential::new(AzCli::new().with_program(&az))
        .token()
        .await
        .unwrap();
    assert_eq!(token, "eyJ0eXAi");
    assert_eq!(
        logged_args(dir.path()).trim(),
        "account get-access-token --resource https://management.azure.com/ --output json"
    );
}

#[tokio::test]
async fn test_cli_credential_failure_is_authentication_error() {
    let dir = TempDir::new().unwrap();
    let az = fake_az(dir.path(), "", 1);

    let err = AzureCliCredential::new(AzCli::new().with_program(&az))
        .token()
        .await
        .unwrap_err();
    assert!(matches!(err, PlatformError::Authentication(_)));
}
