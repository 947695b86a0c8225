//! Backend collaborator traits
//!
//! Implemented by the HTTP client; tests provide in-memory versions.

use async_trait::async_trait;

use deployctl_api::requests::DeploymentRequest;
use deployctl_api::responses::{ArtifactDescriptor, DeploymentSnapshot, Device};

use crate::error::CoreError;
use crate::orchestrator::DeploymentHandle;

/// Source of all artifacts known to the backend
#[async_trait]
pub trait ArtifactCatalog: Send + Sync {
    async fn list_artifacts(&self) -> Result<Vec<ArtifactDescriptor>, CoreError>;
}

/// Deployment creation and status queries
#[async_trait]
pub trait DeploymentBackend: Send + Sync {
    /// Submit a deployment; fails with `Unauthorized`, `Conflict` or `Backend`
    async fn create_deployment(
        &self,
        request: &DeploymentRequest,
    ) -> Result<DeploymentHandle, CoreError>;

    /// Fetch a fresh snapshot of the deployment
    async fn get_deployment(
        &self,
        handle: &DeploymentHandle,
    ) -> Result<DeploymentSnapshot, CoreError>;
}

/// Device lookup in the inventory service
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    async fn device_by_hostname(&self, hostname: &str) -> Result<Device, CoreError>;
}
