//! deployctl-core: Artifact resolution and deployment orchestration
//!
//! Implements the `VersionResolver`, which picks the artifact with the highest
//! semantic version, and the `DeploymentOrchestrator`, which creates a deployment
//! and polls it until a terminal status or the wait runs out.

pub mod backend;
pub mod config;
pub mod ensure;
pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod state;

pub use backend::{ArtifactCatalog, DeploymentBackend, DeviceInventory};
pub use config::{COMMS_VERSION_KEY, EnsureConfig, WaitConfig};
pub use ensure::{EnsureLatest, EnsureOutcome, EnsurePlan, InstalledVersion};
pub use error::CoreError;
pub use orchestrator::{Completion, DeploymentHandle, DeploymentOrchestrator};
pub use resolver::{
    DiagnosticSink, Resolution, SkippedCandidate, TracingSink, VersionResolver, VersionTag,
};
pub use state::DeploymentPhase;
