//! Command components: the unit of work a pipeline step runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::template::CommandTemplate;
use crate::error::Result;
use crate::resources::RegisteredEnvironment;

/// Data type of a component port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    /// A folder (`uri_folder`)
    UriFolder,
}

impl PortType {
    /// Wire name of the port type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UriFolder => "uri_folder",
        }
    }
}

/// A declared input or output of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Data type
    #[serde(rename = "type")]
    pub port_type: PortType,
    /// Human readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Port {
    /// A folder port.
    #[must_use]
    pub fn folder(description: impl Into<String>) -> Self {
        Self {
            port_type: PortType::UriFolder,
            description: Some(description.into()),
        }
    }
}

/// An external command bound to code, an environment and a compute target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandComponent {
    /// Component name
    pub name: String,
    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Environment the command runs in
    pub environment: RegisteredEnvironment,
    /// Compute target name
    pub compute: String,
    /// Code directory uploaded with the component, relative to the project root
    pub code: PathBuf,
    /// Declared inputs
    #[serde(default)]
    pub inputs: BTreeMap<String, Port>,
    /// Declared outputs
    #[serde(default)]
    pub outputs: BTreeMap<String, Port>,
    /// Command line
    pub command: CommandTemplate,
}

impl CommandComponent {
    /// Start a component from its name, environment and command line.
    pub fn new(
        name: impl Into<String>,
        environment: RegisteredEnvironment,
        command: &str,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            display_name: None,
            description: None,
            environment,
            compute: String::new(),
            code: PathBuf::from("."),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            command: CommandTemplate::parse(command)?,
        })
    }

    /// Set the display name.
    #[must_use]
    pub fn display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the compute target.
    #[must_use]
    pub fn compute(mut self, compute: impl Into<String>) -> Self {
        self.compute = compute.into();
        self
    }

    /// Set the code directory.
    #[must_use]
    pub fn code(mut self, code: impl Into<PathBuf>) -> Self {
        self.code = code.into();
        self
    }

    /// Declare an input.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>, port: Port) -> Self {
        self.inputs.insert(name.into(), port);
        self
    }

    /// Declare an output.
    #[must_use]
    pub fn output(mut self, name: impl Into<String>, port: Port) -> Self {
        self.outputs.insert(name.into(), port);
        self
    }
}
