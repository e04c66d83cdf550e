//! Pipeline Emitter Trait
//!
//! Defines the interface for rendering a [`Pipeline`] into a platform-native
//! job definition (for example an Azure ML pipeline-job YAML document).

use crate::pipeline::{Pipeline, PipelineValidator};
use thiserror::Error;

/// Error types for emitter operations
#[derive(Debug, Error)]
pub enum EmitterError {
    /// YAML/JSON serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// The pipeline cannot be expressed by this emitter
    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),
}

impl From<EmitterError> for crate::Error {
    fn from(err: EmitterError) -> Self {
        Self::Emit(err.to_string())
    }
}

/// Result type for emitter operations
pub type EmitterResult<T> = std::result::Result<T, EmitterError>;

/// Trait for pipeline emitters
pub trait Emitter: Send + Sync {
    /// Render a pipeline
    ///
    /// # Errors
    /// Returns `EmitterError` if the pipeline cannot be transformed or serialized
    fn emit(&self, pipeline: &Pipeline) -> EmitterResult<String>;

    /// Format identifier, e.g. "azureml"
    fn format_name(&self) -> &'static str;

    /// File extension for emitted documents
    fn file_extension(&self) -> &'static str;

    /// Validate the pipeline before emission
    ///
    /// The default runs the structural validator.
    ///
    /// # Errors
    /// Returns `EmitterError::InvalidPipeline` listing every problem found
    fn validate(&self, pipeline: &Pipeline) -> EmitterResult<()> {
        PipelineValidator::new(pipeline).validate().map_err(|errors| {
            EmitterError::InvalidPipeline(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }

    /// Validate then render
    ///
    /// # Errors
    /// Returns `EmitterError` from validation or emission
    fn emit_validated(&self, pipeline: &Pipeline) -> EmitterResult<String> {
        self.validate(pipeline)?;
        self.emit(pipeline)
    }
}
