//! Environment registration with `az ml environment create`.
//!
//! The CLI uploads the build context and assigns the next version.

use async_trait::async_trait;
use edgeml_core::PlatformError;
use edgeml_core::platform::{EnvironmentApi, PlatformResult};
use edgeml_core::resources::{EnvironmentSpec, RegisteredEnvironment};
use serde::Deserialize;

use crate::cli::AzCli;

#[derive(Debug, Deserialize)]
struct EnvironmentOutput {
    name: String,
    version: String,
}

/// Environments registered through the Azure CLI.
#[derive(Debug, Clone)]
pub struct CliEnvironments {
    cli: AzCli,
}

impl CliEnvironments {
    /// Use a workspace-scoped CLI runner.
    #[must_use]
    pub const fn new(cli: AzCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl EnvironmentApi for CliEnvironments {
    async fn create_or_update(
        &self,
        spec: &EnvironmentSpec,
    ) -> PlatformResult<RegisteredEnvironment> {
        let build_context = spec.build_context.to_str().ok_or_else(|| {
            PlatformError::request(
                format!("register environment '{}'", spec.name),
                format!(
                    "build context {} is not valid UTF-8",
                    spec.build_context.display()
                ),
            )
        })?;

        let output: EnvironmentOutput = self
            .cli
            .run_json(
                "az ml environment create",
                &[
                    "ml",
                    "environment",
                    "create",
                    "--name",
                    &spec.name,
                    "--description",
                    &spec.description,
                    "--build-context",
                    build_context,
                ],
            )
            .await?;

        Ok(RegisteredEnvironment::new(output.name, output.version))
    }
}
