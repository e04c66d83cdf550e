//! Command line arguments, error categories and exit codes.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use miette::{Diagnostic, Report};
use thiserror::Error;

use crate::tracing::{LogLevel, TracingFormat};

/// Exit codes for the CLI application
pub const EXIT_OK: i32 = 0;
/// CLI, configuration or project layout error exit code
pub const EXIT_CLI: i32 = 2;
/// Platform or pipeline error exit code
pub const EXIT_PLATFORM: i32 = 3;

/// Provision an Azure ML workspace for the PyTorch → ONNX → C pipeline.
///
/// Creates the compute cluster, grants its identity access to workspace storage,
/// registers the build environments and declares the pipeline. Pass `--run` to
/// submit it.
#[derive(Debug, Parser)]
#[command(name = "edgeml", version, about, long_about)]
pub struct Cli {
    /// Submit the pipeline after setup
    #[arg(long)]
    pub run: bool,

    /// Read workspace settings from this file instead of `./.env`
    #[arg(long, value_name = "PATH", env = "EDGEML_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Project directory holding `environments/` and `src/`
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Write the pipeline job definition (Azure ML YAML) to this file
    #[arg(long, value_name = "FILE")]
    pub emit: Option<PathBuf>,

    /// Run against an in-memory workspace; no credentials or network needed
    #[arg(long)]
    pub offline: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value_t = TracingFormat::Compact)]
    pub format: TracingFormat,
}

/// Parse arguments from the process command line.
#[must_use]
pub fn parse() -> Cli {
    Cli::parse()
}

/// CLI-specific error types with proper exit code mapping
#[derive(Error, Debug, Clone, Diagnostic)]
pub enum CliError {
    /// Settings or project layout problem (exit code 2)
    #[error("{message}")]
    #[diagnostic(code(edgeml::cli::config))]
    Config {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Platform or pipeline failure (exit code 3)
    #[error("{message}")]
    #[diagnostic(code(edgeml::cli::platform))]
    Platform {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
    /// Other unexpected error (exit code 3)
    #[error("Unexpected error: {message}")]
    #[diagnostic(code(edgeml::cli::other))]
    Other {
        /// The error message
        message: String,
        /// Optional help text
        #[help]
        help: Option<String>,
    },
}

impl CliError {
    /// Create a new configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new platform error
    #[must_use]
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
            help: None,
        }
    }

    /// Create a new other error
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
            help: None,
        }
    }

    /// Add help text to an existing error, returning a new error with the help text set.
    #[must_use]
    pub fn with_help(self, help_text: impl Into<String>) -> Self {
        let help = Some(help_text.into());
        match self {
            Self::Config { message, .. } => Self::Config { message, help },
            Self::Platform { message, .. } => Self::Platform { message, help },
            Self::Other { message, .. } => Self::Other { message, help },
        }
    }
}

/// Convert `edgeml_core::Error` to the matching `CliError` category.
///
/// Missing settings and directories are configuration errors (exit code 2);
/// IO failures are unexpected; everything else comes from the platform or the
/// pipeline declaration (exit code 3). Help text is carried over.
impl From<edgeml_core::Error> for CliError {
    fn from(err: edgeml_core::Error) -> Self {
        let help = err.help().map(|h| h.to_string());
        let base = if err.is_configuration() {
            Self::config(err.to_string())
        } else if matches!(err, edgeml_core::Error::Io(_)) {
            Self::other(err.to_string())
        } else {
            Self::platform(err.to_string())
        };
        match help {
            Some(help) => base.with_help(help),
            None => base,
        }
    }
}

impl From<edgeml_core::PlatformError> for CliError {
    fn from(err: edgeml_core::PlatformError) -> Self {
        edgeml_core::Error::from(err).into()
    }
}

/// Map CLI error to appropriate exit code
#[must_use]
pub const fn exit_code_for(err: &CliError) -> i32 {
    match err {
        CliError::Config { .. } => EXIT_CLI,
        CliError::Platform { .. } | CliError::Other { .. } => EXIT_PLATFORM,
    }
}

/// Render an error on stderr with miette.
#[allow(clippy::print_stderr)]
pub fn render_error(err: &CliError) {
    let report = Report::new(err.clone());
    eprintln!("{report:?}");
    let _ = io::stderr().flush();
}
