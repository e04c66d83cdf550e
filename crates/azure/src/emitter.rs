//! Azure ML Pipeline Emitter
//!
//! Transforms a [`Pipeline`] into Azure ML v2 pipeline-job YAML that can be
//! submitted with `az ml job create --file`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use edgeml_core::emitter::{Emitter, EmitterError, EmitterResult};
use edgeml_core::pipeline::{Pipeline, Step};

use crate::schema::{
    CommandJob, InlineComponent, JobOutput, PIPELINE_JOB_SCHEMA, PipelineJob, PipelineSettings,
};

/// Azure ML pipeline-job emitter
///
/// # Pipeline to Azure ML Mapping
///
/// | Pipeline | Azure ML YAML |
/// |----------|---------------|
/// | `step.name` | key under `jobs` |
/// | `step.component` | inline `component` of type `command` |
/// | `component.environment` | `azureml:<name>:<version>` |
/// | `component.code` | absolute path under the base directory |
/// | `step.inputs` | `${{parent.jobs.<step>.outputs.<port>}}` |
/// | `pipeline.outputs` | `${{parent.outputs.<name>}}` on the producing job |
#[derive(Debug, Clone, Default)]
pub struct AzureMlEmitter {
    /// Directory component code paths are resolved against
    pub base_dir: Option<PathBuf>,
    /// Experiment to file the job under
    pub experiment_name: Option<String>,
}

impl AzureMlEmitter {
    /// Create an emitter that leaves code paths as declared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve component code paths against `base_dir`.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(base_dir.into());
        self
    }

    /// File the job under an experiment.
    #[must_use]
    pub fn with_experiment(mut self, name: impl Into<String>) -> Self {
        self.experiment_name = Some(name.into());
        self
    }

    fn code_path(&self, code: &Path) -> String {
        match &self.base_dir {
            Some(base) if code.is_relative() => base.join(code).display().to_string(),
            _ => code.display().to_string(),
        }
    }

    fn build_job(&self, pipeline: &Pipeline) -> EmitterResult<PipelineJob> {
        let mut jobs = BTreeMap::new();
        for step in &pipeline.steps {
            jobs.insert(step.name.clone(), self.build_command_job(pipeline, step));
        }

        let mut outputs = BTreeMap::new();
        for (name, source) in &pipeline.outputs {
            let port = pipeline
                .step(&source.step)
                .and_then(|s| s.component.outputs.get(&source.port))
                .ok_or_else(|| {
                    EmitterError::InvalidPipeline(format!(
                        "pipeline output '{name}' refers to unknown {source}"
                    ))
                })?;
            outputs.insert(
                name.clone(),
                JobOutput {
                    output_type: port.port_type.as_str().to_string(),
                },
            );
        }

        Ok(PipelineJob {
            schema: PIPELINE_JOB_SCHEMA.to_string(),
            job_type: "pipeline".to_string(),
            display_name: Some(pipeline.name.clone()),
            description: pipeline.description.clone(),
            experiment_name: self.experiment_name.clone(),
            settings: PipelineSettings {
                default_compute: pipeline.default_compute.as_deref().map(compute_ref),
            },
            jobs,
            outputs,
        })
    }

    fn build_command_job(&self, pipeline: &Pipeline, step: &Step) -> CommandJob {
        let component = &step.component;

        let inputs = step
            .inputs
            .iter()
            .map(|(input, source)| {
                (
                    input.clone(),
                    format!(
                        "${{{{parent.jobs.{}.outputs.{}}}}}",
                        source.step, source.port
                    ),
                )
            })
            .collect();

        let outputs = pipeline
            .outputs
            .iter()
            .filter(|(_, source)| source.step == step.name)
            .map(|(name, source)| {
                (
                    source.port.clone(),
                    format!("${{{{parent.outputs.{name}}}}}"),
                )
            })
            .collect();

        // Steps on the pipeline's default compute inherit it from settings.
        let compute = (!component.compute.is_empty()
            && pipeline.default_compute.as_deref() != Some(component.compute.as_str()))
        .then(|| compute_ref(&component.compute));

        CommandJob {
            job_type: "command".to_string(),
            compute,
            component: InlineComponent {
                name: component.name.clone(),
                display_name: component.display_name.clone(),
                description: component.description.clone(),
                component_type: "command".to_string(),
                code: self.code_path(&component.code),
                environment: format!("azureml:{}", component.environment),
                command: component.command.as_str().to_string(),
                inputs: component.inputs.clone(),
                outputs: component.outputs.clone(),
            },
            inputs,
            outputs,
        }
    }
}

fn compute_ref(name: &str) -> String {
    format!("azureml:{name}")
}

impl Emitter for AzureMlEmitter {
    fn emit(&self, pipeline: &Pipeline) -> EmitterResult<String> {
        let job = self.build_job(pipeline)?;
        serde_yaml::to_string(&job).map_err(|e| EmitterError::Serialization(e.to_string()))
    }

    fn format_name(&self) -> &'static str {
        "azureml"
    }

    fn file_extension(&self) -> &'static str {
        "yml"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PipelineJob;
    use edgeml_core::blueprint::{Blueprint, GCC_ENV, ONNX2C_ENV, PYTORCH_ENV};
    use edgeml_core::resources::{EnvironmentCatalog, RegisteredEnvironment};

    fn pipeline() -> Pipeline {
        let catalog: EnvironmentCatalog = [
            RegisteredEnvironment::new(PYTORCH_ENV, "1"),
            RegisteredEnvironment::new(ONNX2C_ENV, "1"),
            RegisteredEnvironment::new(GCC_ENV, "4"),
        ]
        .into_iter()
        .collect();
        Blueprint::default().pipeline(&catalog).unwrap()
    }

    fn emit(emitter: &AzureMlEmitter) -> PipelineJob {
        let yaml = emitter.emit_validated(&pipeline()).unwrap();
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn test_pipeline_header() {
        let job = emit(&AzureMlEmitter::new());
        assert_eq!(job.job_type, "pipeline");
        assert_eq!(job.schema, PIPELINE_JOB_SCHEMA);
        assert_eq!(
            job.settings.default_compute.as_deref(),
            Some("azureml:cpu-cluster")
        );
        assert_eq!(job.jobs.len(), 4);
    }

    #[test]
    fn test_input_bindings_reference_upstream_jobs() {
        let job = emit(&AzureMlEmitter::new());
        let compile = &job.jobs["compile_step"];
        assert_eq!(
            compile.inputs["c_code_dir"],
            "${{parent.jobs.onnx2c_step.outputs.output_dir}}"
        );
        assert_eq!(
            compile.inputs["model_dir"],
            "${{parent.jobs.train_step.outputs.output_dir}}"
        );
        assert!(job.jobs["train_step"].inputs.is_empty());
    }

    #[test]
    fn test_outputs_bound_to_parent() {
        let job = emit(&AzureMlEmitter::new());
        assert_eq!(
            job.jobs["binary_step"].outputs["output_dir"],
            "${{parent.outputs.minimal_binary}}"
        );
        assert_eq!(job.outputs.len(), 4);
        assert_eq!(job.outputs["test_results"].output_type, "uri_folder");
    }

    #[test]
    fn test_component_fields() {
        let job = emit(&AzureMlEmitter::new().with_base_dir("/work/project"));
        let component = &job.jobs["binary_step"].component;
        assert_eq!(component.environment, "azureml:gcc-env:4");
        assert_eq!(component.code, "/work/project/src/minimal_binary");
        assert_eq!(
            component.command,
            "python run.py --c_code_dir ${{inputs.c_code_dir}} --output_dir ${{outputs.output_dir}}"
        );
        assert!(job.jobs["binary_step"].compute.is_none());
    }

    #[test]
    fn test_port_exposed_twice_is_not_emitted() {
        let mut pipeline = pipeline();
        pipeline.outputs.insert(
            "binary_copy".into(),
            edgeml_core::pipeline::OutputRef::new("binary_step", "output_dir"),
        );

        let err = AzureMlEmitter::new().emit_validated(&pipeline).unwrap_err();
        assert!(matches!(err, EmitterError::InvalidPipeline(_)));
        assert!(err.to_string().contains("'binary_copy' and 'minimal_binary'"));
    }

    #[test]
    fn test_experiment_name() {
        let job = emit(&AzureMlEmitter::new().with_experiment("edge"));
        assert_eq!(job.experiment_name.as_deref(), Some("edge"));
    }

    #[test]
    fn test_format_metadata() {
        let emitter = AzureMlEmitter::new();
        assert_eq!(emitter.format_name(), "azureml");
        assert_eq!(emitter.file_extension(), "yml");
    }
}
