//! Azure ML pipeline job schema types.
//!
//! Data structures for pipeline-job YAML generation.
//! See: <https://learn.microsoft.com/azure/machine-learning/reference-yaml-job-pipeline>

use std::collections::BTreeMap;

use edgeml_core::pipeline::Port;
use serde::{Deserialize, Serialize};

/// JSON schema URL of pipeline jobs.
pub const PIPELINE_JOB_SCHEMA: &str =
    "https://azuremlschemas.azureedge.net/latest/pipelineJob.schema.json";

/// A pipeline job definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    /// Schema URL
    #[serde(rename = "$schema")]
    pub schema: String,

    /// Always `pipeline`
    #[serde(rename = "type")]
    pub job_type: String,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Experiment the job is filed under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experiment_name: Option<String>,

    /// Pipeline settings
    pub settings: PipelineSettings,

    /// Child jobs by name
    pub jobs: BTreeMap<String, CommandJob>,

    /// Pipeline-level outputs
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, JobOutput>,
}

/// Pipeline settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Compute used by jobs that do not set one (`azureml:<name>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_compute: Option<String>,
}

/// A command job inside a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandJob {
    /// Always `command`
    #[serde(rename = "type")]
    pub job_type: String,

    /// Compute target (`azureml:<name>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute: Option<String>,

    /// Inline component definition
    pub component: InlineComponent,

    /// Input bindings (`${{parent.jobs.<step>.outputs.<port>}}`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub inputs: BTreeMap<String, String>,

    /// Output bindings (`${{parent.outputs.<name>}}`)
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, String>,
}

/// A command component defined inline in a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineComponent {
    /// Component name
    pub name: String,

    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Always `command`
    #[serde(rename = "type")]
    pub component_type: String,

    /// Code directory uploaded with the component
    pub code: String,

    /// Environment reference (`azureml:<name>:<version>`)
    pub environment: String,

    /// Command line with `${{inputs.*}}` / `${{outputs.*}}` placeholders
    pub command: String,

    /// Declared inputs
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub inputs: BTreeMap<String, Port>,

    /// Declared outputs
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub outputs: BTreeMap<String, Port>,
}

/// A pipeline-level output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutput {
    /// Data type, e.g. `uri_folder`
    #[serde(rename = "type")]
    pub output_type: String,
}

/// Response of `az ml job create`
#[derive(Debug, Clone, Deserialize)]
pub struct JobCreated {
    /// Job name
    pub name: String,
    /// Initial status
    #[serde(default)]
    pub status: Option<String>,
    /// Service endpoints, including the Studio link
    #[serde(default)]
    pub services: Option<BTreeMap<String, JobService>>,
}

/// A service endpoint of a job
#[derive(Debug, Clone, Deserialize)]
pub struct JobService {
    /// Endpoint URL
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl JobCreated {
    /// Link to the job in Azure ML Studio.
    #[must_use]
    pub fn studio_url(&self) -> Option<&str> {
        self.services
            .as_ref()?
            .get("Studio")?
            .endpoint
            .as_deref()
    }
}
