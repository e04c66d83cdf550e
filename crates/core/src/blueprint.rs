//! The ONNX-to-C deployment: what gets provisioned and how the pipeline is wired.
//!
//! ```text
//! train_step ──► onnx2c_step ──► binary_step
//!      │              │
//!      └──────► compile_step ◄┘
//! ```

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::pipeline::{CommandComponent, Pipeline, PipelineBuilder, Port};
use crate::resources::{
    ComputeCluster, EnvironmentCatalog, EnvironmentSpec, IdentityType, PrincipalType,
    RegisteredEnvironment,
};

/// Name of the compute cluster.
pub const CLUSTER_NAME: &str = "cpu-cluster";
/// Default blob datastore of a workspace.
pub const BLOB_DATASTORE: &str = "workspaceblobstore";
/// Built-in "Storage Blob Data Contributor" role.
pub const STORAGE_BLOB_DATA_CONTRIBUTOR: &str = "ba92f5b4-2d11-453d-a403-e96b0029c9fe";
/// Name of the declared pipeline.
pub const PIPELINE_NAME: &str = "pytorch-onnx-c-pipeline";

/// Environment used for training and ONNX export.
pub const PYTORCH_ENV: &str = "pytorch-onnx-env";
/// Environment used for ONNX to C conversion.
pub const ONNX2C_ENV: &str = "onnx2c-env";
/// Environment used for compiling and testing C code.
pub const GCC_ENV: &str = "gcc-env";

/// Everything the provisioner sets up.
#[derive(Debug, Clone)]
pub struct Blueprint {
    /// Compute cluster to ensure
    pub cluster: ComputeCluster,
    /// Datastore whose storage account the cluster identity is granted access to
    pub datastore: String,
    /// Role GUID granted to the cluster identity
    pub role: String,
    /// Principal type of the cluster identity
    pub principal_type: PrincipalType,
    /// Environments to register, in order
    pub environments: Vec<EnvironmentSpec>,
    /// Directories the project must contain
    pub required_directories: Vec<PathBuf>,
}

impl Default for Blueprint {
    fn default() -> Self {
        Self {
            cluster: ComputeCluster {
                name: CLUSTER_NAME.into(),
                size: "Standard_DS3_v2".into(),
                min_instances: 0,
                max_instances: 4,
                idle_time_before_scale_down: 120,
                identity: IdentityType::SystemAssigned,
            },
            datastore: BLOB_DATASTORE.into(),
            role: STORAGE_BLOB_DATA_CONTRIBUTOR.into(),
            principal_type: PrincipalType::ServicePrincipal,
            environments: vec![
                EnvironmentSpec::new(
                    PYTORCH_ENV,
                    "environments/pytorch",
                    "Environment for PyTorch training and ONNX export",
                ),
                EnvironmentSpec::new(
                    ONNX2C_ENV,
                    "environments/onnx2c",
                    "Environment for ONNX to C conversion",
                ),
                EnvironmentSpec::new(
                    GCC_ENV,
                    "environments/gcc",
                    "Environment for C compilation and testing",
                ),
            ],
            required_directories: [
                "environments/pytorch",
                "environments/onnx2c",
                "environments/gcc",
                "src/pytorch_train",
                "src/onnx2c",
                "src/compile_test",
                "src/minimal_binary",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
        }
    }
}

impl Blueprint {
    /// Declare the train → convert → compile/test → package pipeline.
    pub fn pipeline(&self, catalog: &EnvironmentCatalog) -> Result<Pipeline> {
        onnx_c_pipeline(catalog, &self.cluster.name)
    }
}

fn environment(catalog: &EnvironmentCatalog, name: &str) -> Result<RegisteredEnvironment> {
    catalog
        .get(name)
        .cloned()
        .ok_or_else(|| Error::UnregisteredEnvironment {
            name: name.to_string(),
        })
}

/// Build the ONNX-to-C pipeline against registered environment versions.
pub fn onnx_c_pipeline(catalog: &EnvironmentCatalog, compute: &str) -> Result<Pipeline> {
    let train = CommandComponent::new(
        "pytorch_train",
        environment(catalog, PYTORCH_ENV)?,
        "python run.py --output_dir ${{outputs.output_dir}}",
    )?
    .display_name("Train PyTorch Model and Export to ONNX")
    .description("Trains a PyTorch model and exports it to ONNX format")
    .compute(compute)
    .code("src/pytorch_train")
    .output(
        "output_dir",
        Port::folder("Output directory for model and test data"),
    );

    let onnx2c = CommandComponent::new(
        "onnx2c",
        environment(catalog, ONNX2C_ENV)?,
        "python run.py --model_dir ${{inputs.model_dir}} --output_dir ${{outputs.output_dir}}",
    )?
    .display_name("Convert ONNX to C")
    .description("Converts ONNX model to C code using onnx2c")
    .compute(compute)
    .code("src/onnx2c")
    .input(
        "model_dir",
        Port::folder("Directory containing ONNX model and test data"),
    )
    .output(
        "output_dir",
        Port::folder("Output directory for core C model code"),
    );

    let compile_and_test = CommandComponent::new(
        "compile_and_test",
        environment(catalog, GCC_ENV)?,
        "python run.py --c_code_dir ${{inputs.c_code_dir}} --model_dir ${{inputs.model_dir}} --output_dir ${{outputs.output_dir}}",
    )?
    .display_name("Compile C Code and Run Tests")
    .description("Compiles C code and runs tests")
    .compute(compute)
    .code("src/compile_test")
    .input(
        "c_code_dir",
        Port::folder("Directory containing core C model code"),
    )
    .input(
        "model_dir",
        Port::folder("Directory containing test data from model training"),
    )
    .output("output_dir", Port::folder("Output directory for test results"));

    let build_minimal = CommandComponent::new(
        "build_minimal",
        environment(catalog, GCC_ENV)?,
        "python run.py --c_code_dir ${{inputs.c_code_dir}} --output_dir ${{outputs.output_dir}}",
    )?
    .display_name("Build Minimal Binary")
    .description("Creates minimal binary for deployment")
    .compute(compute)
    .code("src/minimal_binary")
    .input(
        "c_code_dir",
        Port::folder("Directory containing core C model code"),
    )
    .output(
        "output_dir",
        Port::folder("Output directory for minimal binary"),
    );

    let mut builder = PipelineBuilder::new(PIPELINE_NAME)
        .description(
            "Pipeline for training PyTorch model, converting to ONNX, C, and building minimal binary",
        )
        .default_compute(compute);

    let train_step = builder.add_step("train_step", train, [])?;
    let training_output = train_step.output("output_dir")?;

    let onnx2c_step = builder.add_step(
        "onnx2c_step",
        onnx2c,
        [("model_dir", training_output.clone())],
    )?;
    let c_code_output = onnx2c_step.output("output_dir")?;

    let compile_step = builder.add_step(
        "compile_step",
        compile_and_test,
        [
            ("c_code_dir", c_code_output.clone()),
            ("model_dir", training_output.clone()),
        ],
    )?;

    let binary_step = builder.add_step(
        "binary_step",
        build_minimal,
        [("c_code_dir", c_code_output.clone())],
    )?;

    builder.output("training_output", training_output)?;
    builder.output("c_code_output", c_code_output)?;
    builder.output("test_results", compile_step.output("output_dir")?)?;
    builder.output("minimal_binary", binary_step.output("output_dir")?)?;

    builder.build()
}
