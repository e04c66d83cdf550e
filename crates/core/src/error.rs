//! Error types for edgeml.
//!
//! [`Error`] is what the provisioning flow returns to the CLI. Failures reported
//! by a platform service are carried as [`PlatformError`] so callers can match on
//! the few conditions that are recoverable (a role assignment that already exists).

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::pipeline::ValidationError;

/// Result type alias using the edgeml error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while preparing or provisioning a workspace.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A required workspace setting is absent from the environment.
    #[error("Required setting '{name}' is not set")]
    #[diagnostic(
        code(edgeml::missing_setting),
        help("Export {name} or add it to a .env file next to the project")
    )]
    MissingSetting {
        /// Environment variable name
        name: &'static str,
    },

    /// One or more directories of the project layout are absent.
    #[error("{} missing under {}", count_phrase(.missing), .root.display())]
    #[diagnostic(code(edgeml::missing_directories))]
    MissingDirectories {
        /// Project root the layout was checked against
        root: PathBuf,
        /// Relative paths that do not exist
        missing: Vec<PathBuf>,
        /// Listing of the missing paths
        #[help]
        listing: String,
    },

    /// The compute cluster was read back without a managed identity.
    #[error("Compute cluster '{cluster}' has no system-assigned identity")]
    #[diagnostic(
        code(edgeml::missing_identity),
        help("Recreate the cluster with a SystemAssigned identity")
    )]
    MissingIdentity {
        /// Compute cluster name
        cluster: String,
    },

    /// A step refers to an environment that was not registered.
    #[error("Environment '{name}' has not been registered")]
    #[diagnostic(code(edgeml::unregistered_environment))]
    UnregisteredEnvironment {
        /// Environment name
        name: String,
    },

    /// The declared pipeline failed validation.
    #[error("Pipeline '{pipeline}' is invalid: {}", join_errors(.errors))]
    #[diagnostic(code(edgeml::invalid_pipeline))]
    InvalidPipeline {
        /// Pipeline name
        pipeline: String,
        /// Every validation failure found
        errors: Vec<ValidationError>,
    },

    /// A command template could not be parsed or rendered.
    #[error("Command template error: {message}")]
    #[diagnostic(code(edgeml::template))]
    Template {
        /// What went wrong
        message: String,
    },

    /// A platform service call failed.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Platform(#[from] PlatformError),

    /// Rendering the pipeline for the platform failed.
    #[error("Failed to emit pipeline: {0}")]
    #[diagnostic(code(edgeml::emit))]
    Emit(String),

    /// IO error.
    #[error("IO error: {0}")]
    #[diagnostic(code(edgeml::io))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a missing-directories error listing every absent path.
    #[must_use]
    pub fn missing_directories(root: impl Into<PathBuf>, missing: Vec<PathBuf>) -> Self {
        let listing = missing_listing(&missing);
        Self::MissingDirectories {
            root: root.into(),
            missing,
            listing,
        }
    }

    /// Create a template error.
    #[must_use]
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Whether this error comes from local configuration rather than the platform.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingSetting { .. } | Self::MissingDirectories { .. }
        )
    }
}

fn count_phrase(missing: &[PathBuf]) -> String {
    if missing.len() == 1 {
        "1 required directory is".to_string()
    } else {
        format!("{} required directories are", missing.len())
    }
}

fn missing_listing(missing: &[PathBuf]) -> String {
    let mut out = String::from("Create the following directories and try again:");
    for dir in missing {
        out.push_str("\n - ");
        out.push_str(&dir.display().to_string());
    }
    out
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors reported by a platform service.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// The resource being created already exists.
    #[error("{resource} '{name}' already exists")]
    #[diagnostic(code(edgeml::platform::already_exists))]
    AlreadyExists {
        /// Resource kind
        resource: &'static str,
        /// Resource name or id
        name: String,
    },

    /// The requested resource does not exist.
    #[error("{resource} '{name}' not found")]
    #[diagnostic(code(edgeml::platform::not_found))]
    NotFound {
        /// Resource kind
        resource: &'static str,
        /// Resource name or id
        name: String,
    },

    /// Credentials could not be obtained or were rejected.
    #[error("Authentication failed: {0}")]
    #[diagnostic(
        code(edgeml::platform::authentication),
        help("Run `az login` or set AZURE_ACCESS_TOKEN")
    )]
    Authentication(String),

    /// A request to the platform failed.
    #[error("{operation} failed: {message}")]
    #[diagnostic(code(edgeml::platform::request))]
    Request {
        /// Operation being performed
        operation: String,
        /// Error reported by the platform
        message: String,
    },

    /// The platform CLI exited unsuccessfully.
    #[error("`{command}` failed: {stderr}")]
    #[diagnostic(code(edgeml::platform::cli))]
    Cli {
        /// Command line that was run
        command: String,
        /// Captured standard error
        stderr: String,
    },

    /// A platform response could not be decoded.
    #[error("Unexpected response from {operation}: {message}")]
    #[diagnostic(code(edgeml::platform::serialization))]
    Serialization {
        /// Operation being performed
        operation: String,
        /// Decoder message
        message: String,
    },

    /// A long-running operation did not finish in time.
    #[error("Timed out waiting for {operation}")]
    #[diagnostic(code(edgeml::platform::timeout))]
    Timeout {
        /// Operation being waited on
        operation: String,
    },
}

impl PlatformError {
    /// Create a request error.
    #[must_use]
    pub fn request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error.
    #[must_use]
    pub fn serialization(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Serialization {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Returns true for [`PlatformError::AlreadyExists`].
    #[must_use]
    pub const fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
