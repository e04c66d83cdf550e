//! Runner for the Azure CLI.

use std::path::PathBuf;

use edgeml_core::platform::PlatformResult;
use edgeml_core::{PlatformError, WorkspaceSettings};
use serde::de::DeserializeOwned;
use tokio::process::Command;

/// Invokes `az`, optionally scoped to one Machine Learning workspace.
///
/// Workspace scoping flags are added to `az ml` commands only. Every command asks
/// for JSON output.
#[derive(Debug, Clone)]
pub struct AzCli {
    program: PathBuf,
    workspace: Option<WorkspaceSettings>,
}

impl Default for AzCli {
    fn default() -> Self {
        Self::new()
    }
}

impl AzCli {
    /// Use `az` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("az"),
            workspace: None,
        }
    }

    /// Use a specific executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Scope `az ml` commands to a workspace.
    #[must_use]
    pub fn for_workspace(mut self, settings: &WorkspaceSettings) -> Self {
        self.workspace = Some(settings.clone());
        self
    }

    /// Full argument list for a command.
    #[must_use]
    pub fn arguments(&self, args: &[&str]) -> Vec<String> {
        let mut full: Vec<String> = args.iter().map(ToString::to_string).collect();
        if let (Some(ws), Some(&"ml")) = (&self.workspace, args.first()) {
            full.extend([
                "--subscription".to_string(),
                ws.subscription_id.clone(),
                "--resource-group".to_string(),
                ws.resource_group_name.clone(),
                "--workspace-name".to_string(),
                ws.workspace_name.clone(),
            ]);
        }
        full.extend(["--output".to_string(), "json".to_string()]);
        full
    }

    /// Run a command and return its standard output.
    pub async fn run(&self, args: &[&str]) -> PlatformResult<String> {
        let full = self.arguments(args);
        let command_line = format!("az {}", args.join(" "));
        tracing::debug!(command = %command_line, "Running Azure CLI");

        let output = Command::new(&self.program)
            .args(&full)
            .output()
            .await
            .map_err(|e| PlatformError::Cli {
                command: command_line.clone(),
                stderr: format!("failed to execute {}: {e}", self.program.display()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PlatformError::Cli {
                command: command_line,
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run a command and decode its JSON output.
    pub async fn run_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        args: &[&str],
    ) -> PlatformResult<T> {
        let stdout = self.run(args).await?;
        serde_json::from_str(&stdout).map_err(|e| PlatformError::serialization(operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> WorkspaceSettings {
        WorkspaceSettings::new("sub", "rg", "ws")
    }

    #[test]
    fn test_ml_commands_are_scoped() {
        let cli = AzCli::new().for_workspace(&settings());
        let args = cli.arguments(&["ml", "job", "create", "--file", "job.yml"]);
        assert_eq!(
            args,
            vec![
                "ml",
                "job",
                "create",
                "--file",
                "job.yml",
                "--subscription",
                "sub",
                "--resource-group",
                "rg",
                "--workspace-name",
                "ws",
                "--output",
                "json",
            ]
        );
    }

    #[test]
    fn test_other_commands_are_not_scoped() {
        let cli = AzCli::new().for_workspace(&settings());
        let args = cli.arguments(&["account", "show"]);
        assert_eq!(args, vec!["account", "show", "--output", "json"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_cli_error() {
        let cli = AzCli::new().with_program("/nonexistent/az");
        let err = cli.run(&["account", "show"]).await.unwrap_err();
        assert!(matches!(err, PlatformError::Cli { .. }));
    }
}
