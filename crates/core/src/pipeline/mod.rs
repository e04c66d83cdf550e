//! Declarative pipeline model.
//!
//! A [`Pipeline`] is a list of steps, each running a [`CommandComponent`]. Steps
//! are connected by binding one step's declared output to another step's declared
//! input, which yields the dependency graph the platform schedules.
//!
//! ```ignore
//! let mut builder = PipelineBuilder::new("example").default_compute("cpu-cluster");
//! let train = builder.add_step("train", train_component, [])?;
//! let convert = builder.add_step("convert", convert_component, [("model_dir", train.output("output_dir")?)])?;
//! builder.output("c_code", convert.output("output_dir")?)?;
//! let pipeline = builder.build()?;
//! ```

mod builder;
mod component;
mod template;
mod validation;

pub use builder::{PipelineBuilder, StepHandle};
pub use component::{CommandComponent, Port, PortType};
pub use template::{CommandTemplate, Placeholder, PortDirection};
pub use validation::{PipelineValidator, ValidationError};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Reference to a declared output of a step.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutputRef {
    /// Producing step
    pub step: String,
    /// Output port on that step
    pub port: String,
}

impl OutputRef {
    /// Create an output reference.
    #[must_use]
    pub fn new(step: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            port: port.into(),
        }
    }
}

impl fmt::Display for OutputRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.outputs.{}", self.step, self.port)
    }
}

/// A component invocation with its input bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within the pipeline
    pub name: String,
    /// Component the step runs
    pub component: CommandComponent,
    /// Input name → upstream output
    #[serde(default)]
    pub inputs: BTreeMap<String, OutputRef>,
}

impl Step {
    /// Names of the steps this step consumes outputs from.
    pub fn upstream(&self) -> BTreeSet<&str> {
        self.inputs.values().map(|r| r.step.as_str()).collect()
    }
}

/// A declared pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,
    /// Description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Compute used by steps that do not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_compute: Option<String>,
    /// Steps in declaration order
    pub steps: Vec<Step>,
    /// Pipeline output name → step output
    #[serde(default)]
    pub outputs: BTreeMap<String, OutputRef>,
}

impl Pipeline {
    /// Look up a step by name.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Distinct producer → consumer step pairs, sorted.
    #[must_use]
    pub fn edges(&self) -> BTreeSet<(String, String)> {
        self.steps
            .iter()
            .flat_map(|step| {
                step.upstream()
                    .into_iter()
                    .map(|up| (up.to_string(), step.name.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Dependency graph over step names; edges point from producer to consumer.
    ///
    /// Bindings to unknown steps are skipped; the validator reports them.
    #[must_use]
    pub fn graph(&self) -> DiGraph<String, ()> {
        let mut graph = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();

        for step in &self.steps {
            let idx = graph.add_node(step.name.clone());
            index.insert(step.name.as_str(), idx);
        }

        for (from, to) in self.edges() {
            if let (Some(&a), Some(&b)) = (index.get(from.as_str()), index.get(to.as_str())) {
                graph.add_edge(a, b, ());
            }
        }

        graph
    }

    /// Step names in an order where producers precede consumers, or `None` on a cycle.
    #[must_use]
    pub fn topological_order(&self) -> Option<Vec<String>> {
        let graph = self.graph();
        toposort(&graph, None)
            .ok()
            .map(|order| order.into_iter().map(|idx| graph[idx].clone()).collect())
    }
}
