//! Incremental pipeline construction.
//!
//! Steps can only consume outputs of steps added before them, so a builder
//! cannot produce a cycle.

use std::collections::BTreeMap;

use super::validation::{PipelineValidator, ValidationError};
use super::{CommandComponent, OutputRef, Pipeline, Step};
use crate::error::{Error, Result};

/// Handle to a step already added to a [`PipelineBuilder`].
#[derive(Debug, Clone)]
pub struct StepHandle {
    pipeline: String,
    name: String,
    outputs: Vec<String>,
}

impl StepHandle {
    /// Step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reference one of the step's declared outputs.
    pub fn output(&self, port: &str) -> Result<OutputRef> {
        if self.outputs.iter().any(|o| o == port) {
            Ok(OutputRef::new(self.name.clone(), port))
        } else {
            Err(Error::InvalidPipeline {
                pipeline: self.pipeline.clone(),
                errors: vec![ValidationError::UnknownOutput {
                    step: self.name.clone(),
                    port: port.into(),
                }],
            })
        }
    }
}

/// Builds a [`Pipeline`] step by step.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    pipeline: Pipeline,
}

impl PipelineBuilder {
    /// Start a pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            pipeline: Pipeline {
                name: name.into(),
                description: None,
                default_compute: None,
                steps: Vec::new(),
                outputs: BTreeMap::new(),
            },
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.pipeline.description = Some(description.into());
        self
    }

    /// Set the compute used by steps that do not name one.
    #[must_use]
    pub fn default_compute(mut self, compute: impl Into<String>) -> Self {
        self.pipeline.default_compute = Some(compute.into());
        self
    }

    /// Add a step whose inputs are bound to outputs of earlier steps.
    pub fn add_step<'a, I>(
        &mut self,
        name: impl Into<String>,
        component: CommandComponent,
        bindings: I,
    ) -> Result<StepHandle>
    where
        I: IntoIterator<Item = (&'a str, OutputRef)>,
    {
        let name = name.into();
        let mut errors = Vec::new();

        if self.pipeline.step(&name).is_some() {
            errors.push(ValidationError::DuplicateStep(name.clone()));
        }

        let mut inputs = BTreeMap::new();
        for (input, source) in bindings {
            match self.pipeline.step(&source.step) {
                None => errors.push(ValidationError::MissingStep {
                    step: name.clone(),
                    input: input.to_string(),
                    source_step: source.step.clone(),
                }),
                Some(upstream) if !upstream.component.outputs.contains_key(&source.port) => {
                    errors.push(ValidationError::MissingOutput {
                        step: name.clone(),
                        input: input.to_string(),
                        source_step: source.step.clone(),
                        port: source.port.clone(),
                    });
                }
                Some(_) => {}
            }
            inputs.insert(input.to_string(), source);
        }

        if !errors.is_empty() {
            return Err(Error::InvalidPipeline {
                pipeline: self.pipeline.name.clone(),
                errors,
            });
        }

        let handle = StepHandle {
            pipeline: self.pipeline.name.clone(),
            name: name.clone(),
            outputs: component.outputs.keys().cloned().collect(),
        };
        tracing::debug!(step = %name, component = %component.name, "Added pipeline step");
        self.pipeline.steps.push(Step {
            name,
            component,
            inputs,
        });
        Ok(handle)
    }

    /// Expose a step output as a pipeline output.
    pub fn output(&mut self, name: impl Into<String>, source: OutputRef) -> Result<()> {
        let name = name.into();
        let declared = self
            .pipeline
            .step(&source.step)
            .is_some_and(|s| s.component.outputs.contains_key(&source.port));
        if !declared {
            return Err(Error::InvalidPipeline {
                pipeline: self.pipeline.name.clone(),
                errors: vec![ValidationError::InvalidPipelineOutput {
                    output: name,
                    source_step: source.step,
                    port: source.port,
                }],
            });
        }
        if let Some((first, _)) = self
            .pipeline
            .outputs
            .iter()
            .find(|(existing, bound)| **existing != name && **bound == source)
        {
            return Err(Error::InvalidPipeline {
                pipeline: self.pipeline.name.clone(),
                errors: vec![ValidationError::DuplicatePipelineOutput {
                    first: first.clone(),
                    second: name,
                    source_step: source.step,
                    port: source.port,
                }],
            });
        }
        self.pipeline.outputs.insert(name, source);
        Ok(())
    }

    /// Validate and return the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        PipelineValidator::new(&self.pipeline)
            .validate()
            .map_err(|errors| Error::InvalidPipeline {
                pipeline: self.pipeline.name.clone(),
                errors,
            })?;
        Ok(self.pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Port;
    use crate::resources::RegisteredEnvironment;

    fn producer(name: &str) -> CommandComponent {
        CommandComponent::new(
            name,
            RegisteredEnvironment::new("env", "1"),
            "run --out ${{outputs.output_dir}}",
        )
        .unwrap()
        .output("output_dir", Port::folder("out"))
    }

    fn consumer(name: &str) -> CommandComponent {
        CommandComponent::new(
            name,
            RegisteredEnvironment::new("env", "1"),
            "run --in ${{inputs.model_dir}} --out ${{outputs.output_dir}}",
        )
        .unwrap()
        .input("model_dir", Port::folder("in"))
        .output("output_dir", Port::folder("out"))
    }

    #[test]
    fn test_build_linear_pipeline() {
        let mut builder = PipelineBuilder::new("p").default_compute("cpu-cluster");
        let a = builder.add_step("a", producer("a"), []).unwrap();
        let b = builder
            .add_step("b", consumer("b"), [("model_dir", a.output("output_dir").unwrap())])
            .unwrap();
        builder
            .output("final", b.output("output_dir").unwrap())
            .unwrap();

        let pipeline = builder.build().unwrap();
        assert_eq!(pipeline.steps.len(), 2);
        assert_eq!(
            pipeline.topological_order(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(pipeline.outputs["final"], OutputRef::new("b", "output_dir"));
    }

    #[test]
    fn test_port_exposed_twice_is_rejected() {
        let mut builder = PipelineBuilder::new("p").default_compute("cpu-cluster");
        let a = builder.add_step("a", producer("a"), []).unwrap();
        builder.output("model", a.output("output_dir").unwrap()).unwrap();

        let err = builder
            .output("weights", a.output("output_dir").unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("'model' and 'weights'"));

        let pipeline = builder.build().unwrap();
        assert_eq!(pipeline.outputs.len(), 1);
    }

    #[test]
    fn test_binding_to_later_step_is_rejected() {
        let mut builder = PipelineBuilder::new("p").default_compute("cpu-cluster");
        let err = builder
            .add_step("b", consumer("b"), [("model_dir", OutputRef::new("a", "output_dir"))])
            .unwrap_err();

        assert!(matches!(err, Error::InvalidPipeline { .. }));
        assert!(err.to_string().contains("non-existent step 'a'"));
    }

    #[test]
    fn test_handle_rejects_undeclared_output() {
        let mut builder = PipelineBuilder::new("p");
        let a = builder.add_step("a", producer("a"), []).unwrap();
        assert!(a.output("weights").is_err());
        assert_eq!(a.name(), "a");
        assert!(builder
            .output("weights", OutputRef::new("a", "weights"))
            .is_err());
    }

    #[test]
    fn test_duplicate_step_rejected() {
        let mut builder = PipelineBuilder::new("p");
        builder.add_step("a", producer("a"), []).unwrap();
        assert!(builder.add_step("a", producer("a"), []).is_err());
    }

    #[test]
    fn test_build_reports_unbound_input() {
        let mut builder = PipelineBuilder::new("p").default_compute("cpu-cluster");
        builder.add_step("b", consumer("b"), []).unwrap();

        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("leaves input 'model_dir' unbound"));
    }
}
