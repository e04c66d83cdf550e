//! Workspace settings resolved from the process environment.
//!
//! Settings come from three variables, optionally seeded from a `.env` file.
//! Variables already present in the environment take precedence over the file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable holding the Azure subscription id.
pub const SUBSCRIPTION_ID: &str = "subscription_id";
/// Environment variable holding the resource group name.
pub const RESOURCE_GROUP_NAME: &str = "resource_group_name";
/// Environment variable holding the Machine Learning workspace name.
pub const WORKSPACE_NAME: &str = "workspace_name";

/// Coordinates of the target Machine Learning workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Subscription id
    pub subscription_id: String,
    /// Resource group containing the workspace
    pub resource_group_name: String,
    /// Workspace name
    pub workspace_name: String,
}

impl WorkspaceSettings {
    /// Create settings from explicit values.
    #[must_use]
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group_name: impl Into<String>,
        workspace_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group_name: resource_group_name.into(),
            workspace_name: workspace_name.into(),
        }
    }

    /// Load settings, seeding the environment from a `.env` file first.
    ///
    /// With `env_file` set the file must exist. Without it, a `.env` in the
    /// working directory is used when present.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        match env_file {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| dotenv_error(path, &e))?;
                tracing::debug!(path = %path.display(), "Loaded settings file");
            }
            None => match dotenvy::dotenv() {
                Ok(path) => tracing::debug!(path = %path.display(), "Loaded settings file"),
                Err(e) if e.not_found() => {}
                Err(e) => return Err(dotenv_error(Path::new(".env"), &e)),
            },
        }
        Self::from_env()
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary lookup. Blank values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &'static str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(Error::MissingSetting { name })
        };

        Ok(Self {
            subscription_id: get(SUBSCRIPTION_ID)?,
            resource_group_name: get(RESOURCE_GROUP_NAME)?,
            workspace_name: get(WORKSPACE_NAME)?,
        })
    }

    /// ARM id of the resource group.
    #[must_use]
    pub fn resource_group_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group_name
        )
    }

    /// ARM id of the Machine Learning workspace.
    #[must_use]
    pub fn workspace_id(&self) -> String {
        format!(
            "{}/providers/Microsoft.MachineLearningServices/workspaces/{}",
            self.resource_group_id(),
            self.workspace_name
        )
    }

    /// Role-assignment scope for a storage account in the workspace's resource group.
    #[must_use]
    pub fn storage_account_scope(&self, account_name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Storage/storageAccounts/{account_name}",
            self.resource_group_id()
        )
    }

    /// Fully qualified id of a built-in role definition.
    #[must_use]
    pub fn role_definition_id(&self, role_guid: &str) -> String {
        format!(
            "/subscriptions/{}/providers/Microsoft.Authorization/roleDefinitions/{role_guid}",
            self.subscription_id
        )
    }
}

fn dotenv_error(path: &Path, err: &dotenvy::Error) -> Error {
    Error::Io(std::io::Error::other(format!(
        "failed to read {}: {err}",
        path.display()
    )))
}
