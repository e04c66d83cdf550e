//! # edgeml-core
//!
//! Provisioning flow and pipeline model for deploying a PyTorch → ONNX → C
//! pipeline on a managed ML workspace.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  settings / layout       (environment, .env, local dirs) │
//! ├──────────────────────────────────────────────────────────┤
//! │  provision::Provisioner  (ordered setup sequence)        │
//! │    blueprint             (cluster, role, envs, DAG)      │
//! │    pipeline              (components, builder, checks)   │
//! ├──────────────────────────────────────────────────────────┤
//! │  platform::MlClient      (compute, datastores, roles,    │
//! │                           environments, jobs)            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The platform traits are implemented for Azure in `edgeml-azure` and in memory
//! by [`platform::memory::InMemoryPlatform`].

pub mod blueprint;
pub mod emitter;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod platform;
pub mod provision;
pub mod resources;
pub mod settings;

pub use blueprint::Blueprint;
pub use error::{Error, PlatformError, Result};
pub use layout::ProjectLayout;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use platform::MlClient;
pub use provision::{Provisioned, Provisioner};
pub use settings::WorkspaceSettings;
