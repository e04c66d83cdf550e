//! Pipeline validation
//!
//! Checks the wiring of a pipeline before it is handed to the platform.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use super::template::PortDirection;
use super::{Pipeline, Step};

/// Validation errors for pipelines
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Step name '{0}' is used more than once")]
    DuplicateStep(String),

    #[error("Step graph contains cycle: {0}")]
    CyclicDependency(String),

    #[error("Step '{step}' has an empty command")]
    EmptyCommand { step: String },

    #[error("Step '{step}' binds undeclared input '{input}'")]
    UnknownInput { step: String, input: String },

    #[error("Step '{step}' leaves input '{input}' unbound")]
    UnboundInput { step: String, input: String },

    #[error("Step '{step}' input '{input}' references non-existent step '{source_step}'")]
    MissingStep {
        step: String,
        input: String,
        source_step: String,
    },

    #[error("Step '{step}' input '{input}' references undeclared output '{source_step}.{port}'")]
    MissingOutput {
        step: String,
        input: String,
        source_step: String,
        port: String,
    },

    #[error("Step '{step}' declares no output '{port}'")]
    UnknownOutput { step: String, port: String },

    #[error("Step '{step}' command references undeclared {direction} '{name}'")]
    UndeclaredPlaceholder {
        step: String,
        direction: PortDirection,
        name: String,
    },

    #[error("Step '{step}' has no compute target and the pipeline has no default")]
    MissingCompute { step: String },

    #[error("Pipeline output '{output}' references undeclared output '{source_step}.{port}'")]
    InvalidPipelineOutput {
        output: String,
        source_step: String,
        port: String,
    },

    #[error("Pipeline outputs '{first}' and '{second}' both expose '{source_step}.{port}'")]
    DuplicatePipelineOutput {
        first: String,
        second: String,
        source_step: String,
        port: String,
    },
}

/// Validator for pipelines
pub struct PipelineValidator<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> PipelineValidator<'a> {
    /// Create a new validator for the given pipeline
    #[must_use]
    pub const fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    /// Validate the entire pipeline, collecting every error found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut step_index: HashMap<&str, &Step> = HashMap::new();
        for step in &self.pipeline.steps {
            if step_index.insert(step.name.as_str(), step).is_some() {
                errors.push(ValidationError::DuplicateStep(step.name.clone()));
            }
        }

        for step in &self.pipeline.steps {
            self.validate_step(step, &step_index, &mut errors);
        }

        let mut exposed: HashMap<(&str, &str), &str> = HashMap::new();
        for (output, source) in &self.pipeline.outputs {
            if let Some(first) =
                exposed.insert((source.step.as_str(), source.port.as_str()), output.as_str())
            {
                errors.push(ValidationError::DuplicatePipelineOutput {
                    first: first.to_string(),
                    second: output.clone(),
                    source_step: source.step.clone(),
                    port: source.port.clone(),
                });
            }

            let declared = step_index
                .get(source.step.as_str())
                .is_some_and(|s| s.component.outputs.contains_key(&source.port));
            if !declared {
                errors.push(ValidationError::InvalidPipelineOutput {
                    output: output.clone(),
                    source_step: source.step.clone(),
                    port: source.port.clone(),
                });
            }
        }

        if let Err(e) = self.validate_no_cycles(&step_index) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_step(
        &self,
        step: &Step,
        step_index: &HashMap<&str, &Step>,
        errors: &mut Vec<ValidationError>,
    ) {
        let component = &step.component;

        if component.command.is_blank() {
            errors.push(ValidationError::EmptyCommand {
                step: step.name.clone(),
            });
        }

        if component.compute.is_empty() && self.pipeline.default_compute.is_none() {
            errors.push(ValidationError::MissingCompute {
                step: step.name.clone(),
            });
        }

        for placeholder in component.command.placeholders() {
            let declared = match placeholder.direction {
                PortDirection::Input => component.inputs.contains_key(&placeholder.name),
                PortDirection::Output => component.outputs.contains_key(&placeholder.name),
            };
            if !declared {
                errors.push(ValidationError::UndeclaredPlaceholder {
                    step: step.name.clone(),
                    direction: placeholder.direction,
                    name: placeholder.name.clone(),
                });
            }
        }

        for input in component.inputs.keys() {
            if !step.inputs.contains_key(input) {
                errors.push(ValidationError::UnboundInput {
                    step: step.name.clone(),
                    input: input.clone(),
                });
            }
        }

        for (input, source) in &step.inputs {
            if !component.inputs.contains_key(input) {
                errors.push(ValidationError::UnknownInput {
                    step: step.name.clone(),
                    input: input.clone(),
                });
            }

            match step_index.get(source.step.as_str()) {
                None => errors.push(ValidationError::MissingStep {
                    step: step.name.clone(),
                    input: input.clone(),
                    source_step: source.step.clone(),
                }),
                Some(upstream) if !upstream.component.outputs.contains_key(&source.port) => {
                    errors.push(ValidationError::MissingOutput {
                        step: step.name.clone(),
                        input: input.clone(),
                        source_step: source.step.clone(),
                        port: source.port.clone(),
                    });
                }
                Some(_) => {}
            }
        }
    }

    /// Validate the step graph has no cycles using DFS
    fn validate_no_cycles(&self, step_index: &HashMap<&str, &Step>) -> Result<(), ValidationError> {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();

        for step in &self.pipeline.steps {
            if !visited.contains(step.name.as_str()) {
                if let Some(cycle) =
                    Self::detect_cycle(step.name.as_str(), step_index, &mut visited, &mut rec_stack)
                {
                    return Err(ValidationError::CyclicDependency(cycle));
                }
            }
        }

        Ok(())
    }

    /// Detect cycles using DFS over upstream links, returns path if cycle found
    fn detect_cycle(
        step_name: &str,
        step_index: &HashMap<&str, &Step>,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
    ) -> Option<String> {
        visited.insert(step_name.to_string());
        rec_stack.insert(step_name.to_string());

        if let Some(step) = step_index.get(step_name) {
            for dep in step.upstream() {
                if !visited.contains(dep) {
                    if let Some(cycle) = Self::detect_cycle(dep, step_index, visited, rec_stack) {
                        return Some(format!("{step_name} -> {cycle}"));
                    }
                } else if rec_stack.contains(dep) {
                    return Some(format!("{step_name} -> {dep}"));
                }
            }
        }

        rec_stack.remove(step_name);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{CommandComponent, OutputRef, Port};
    use crate::resources::RegisteredEnvironment;
    use std::collections::BTreeMap;

    fn component(name: &str, inputs: &[&str], command: &str) -> CommandComponent {
        let mut c = CommandComponent::new(name, RegisteredEnvironment::new("env", "1"), command)
            .unwrap()
            .compute("cpu-cluster")
            .output("output_dir", Port::folder("out"));
        for input in inputs {
            c = c.input(*input, Port::folder("in"));
        }
        c
    }

    fn create_test_step(name: &str, bindings: &[(&str, &str)]) -> Step {
        let inputs: Vec<&str> = bindings.iter().map(|(input, _)| *input).collect();
        Step {
            name: name.to_string(),
            component: component(name, &inputs, "python run.py --output_dir ${{outputs.output_dir}}"),
            inputs: bindings
                .iter()
                .map(|(input, step)| ((*input).to_string(), OutputRef::new(*step, "output_dir")))
                .collect(),
        }
    }

    fn pipeline(steps: Vec<Step>) -> Pipeline {
        Pipeline {
            name: "test".into(),
            description: None,
            default_compute: None,
            steps,
            outputs: BTreeMap::new(),
        }
    }

    #[test]
    fn test_valid_pipeline() {
        let p = pipeline(vec![
            create_test_step("train", &[]),
            create_test_step("convert", &[("model_dir", "train")]),
        ]);

        assert!(PipelineValidator::new(&p).validate().is_ok());
    }

    #[test]
    fn test_cyclic_dependency() {
        let p = pipeline(vec![
            create_test_step("a", &[("x", "b")]),
            create_test_step("b", &[("x", "a")]),
        ]);

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::CyclicDependency(_)))
        );
    }

    #[test]
    fn test_missing_step() {
        let p = pipeline(vec![create_test_step("convert", &[("model_dir", "train")])]);

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::MissingStep { .. }));
    }

    #[test]
    fn test_missing_output_port() {
        let mut convert = create_test_step("convert", &[("model_dir", "train")]);
        convert
            .inputs
            .insert("model_dir".into(), OutputRef::new("train", "model"));
        let p = pipeline(vec![create_test_step("train", &[]), convert]);

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::MissingOutput {
                step: "convert".into(),
                input: "model_dir".into(),
                source_step: "train".into(),
                port: "model".into(),
            }]
        );
    }

    #[test]
    fn test_unbound_and_unknown_inputs() {
        let mut step = create_test_step("convert", &[("model_dir", "train")]);
        step.component = step.component.input("c_code_dir", Port::folder("c"));
        step.inputs
            .insert("extra".into(), OutputRef::new("train", "output_dir"));
        let p = pipeline(vec![create_test_step("train", &[]), step]);

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert!(errors.contains(&ValidationError::UnboundInput {
            step: "convert".into(),
            input: "c_code_dir".into(),
        }));
        assert!(errors.contains(&ValidationError::UnknownInput {
            step: "convert".into(),
            input: "extra".into(),
        }));
    }

    #[test]
    fn test_undeclared_placeholder() {
        let mut step = create_test_step("train", &[]);
        step.component.command =
            crate::pipeline::CommandTemplate::parse("run ${{inputs.data}} ${{outputs.output_dir}}")
                .unwrap();
        let p = pipeline(vec![step]);

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UndeclaredPlaceholder {
                step: "train".into(),
                direction: PortDirection::Input,
                name: "data".into(),
            }]
        );
    }

    #[test]
    fn test_empty_command() {
        let mut step = create_test_step("train", &[]);
        step.component.command = crate::pipeline::CommandTemplate::parse("   ").unwrap();
        let p = pipeline(vec![step]);

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::EmptyCommand { .. }))
        );
    }

    #[test]
    fn test_duplicate_step_names() {
        let p = pipeline(vec![
            create_test_step("train", &[]),
            create_test_step("train", &[]),
        ]);

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateStep("train".into())));
    }

    #[test]
    fn test_missing_compute_without_default() {
        let mut step = create_test_step("train", &[]);
        step.component.compute = String::new();
        let mut p = pipeline(vec![step]);

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert!(errors.contains(&ValidationError::MissingCompute {
            step: "train".into()
        }));

        p.default_compute = Some("cpu-cluster".into());
        assert!(PipelineValidator::new(&p).validate().is_ok());
    }

    #[test]
    fn test_invalid_pipeline_output() {
        let mut p = pipeline(vec![create_test_step("train", &[])]);
        p.outputs
            .insert("model".into(), OutputRef::new("train", "weights"));

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, ValidationError::InvalidPipelineOutput { .. }))
        );
    }

    #[test]
    fn test_two_outputs_on_one_port() {
        let mut p = pipeline(vec![create_test_step("train", &[])]);
        p.outputs
            .insert("model".into(), OutputRef::new("train", "output_dir"));
        p.outputs
            .insert("weights".into(), OutputRef::new("train", "output_dir"));

        let errors = PipelineValidator::new(&p).validate().unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::DuplicatePipelineOutput {
                first: "model".into(),
                second: "weights".into(),
                source_step: "train".into(),
                port: "output_dir".into(),
            }]
        );
    }
}
