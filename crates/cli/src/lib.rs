//! edgeml command line application.
//!
//! The binary wires [`edgeml_core::Provisioner`] to either the Azure backend or
//! the in-memory platform and maps failures to exit codes.

pub mod cli;
pub mod run;
pub mod tracing;
