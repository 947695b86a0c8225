//! Ensure a device runs the latest versioned artifact
//!
//! Looks the device up by hostname, resolves the latest artifact, and deploys it
//! unless the device already reports that version.

use std::sync::Arc;

use tracing::info;

use crate::backend::{ArtifactCatalog, DeviceInventory};
use crate::config::EnsureConfig;
use crate::error::CoreError;
use crate::orchestrator::{Completion, DeploymentHandle, DeploymentOrchestrator};
use crate::resolver::VersionResolver;

/// Version the device reported before a deployment was started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledVersion {
    /// Device has no version attribute yet
    Missing,
    /// Device reported a different version
    Outdated(String),
}

/// What [`EnsureLatest::plan`] decided for a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsurePlan {
    /// Device already reports the latest version
    UpToDate { artifact: String, version: String },
    /// Latest artifact must be deployed to the device
    Deploy {
        artifact: String,
        version: String,
        installed: InstalledVersion,
        device_id: String,
        deployment: String,
    },
}

impl EnsurePlan {
    /// Name of the resolved artifact
    pub fn artifact(&self) -> &str {
        match self {
            EnsurePlan::UpToDate { artifact, .. } | EnsurePlan::Deploy { artifact, .. } => {
                artifact
            }
        }
    }

    /// Raw provide value of the resolved artifact
    pub fn version(&self) -> &str {
        match self {
            EnsurePlan::UpToDate { version, .. } | EnsurePlan::Deploy { version, .. } => version,
        }
    }
}

/// Result of [`EnsureLatest::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Device already reports the latest version; nothing was deployed
    UpToDate { artifact: String, version: String },
    /// A deployment was created and, if waiting is enabled, finished
    Deployed {
        artifact: String,
        version: String,
        installed: InstalledVersion,
        handle: DeploymentHandle,
        completion: Completion,
    },
}

/// Ensure-latest workflow over the backend collaborators
pub struct EnsureLatest {
    inventory: Arc<dyn DeviceInventory>,
    catalog: Arc<dyn ArtifactCatalog>,
    orchestrator: DeploymentOrchestrator,
    config: EnsureConfig,
}

impl EnsureLatest {
    pub fn new(
        inventory: Arc<dyn DeviceInventory>,
        catalog: Arc<dyn ArtifactCatalog>,
        orchestrator: DeploymentOrchestrator,
        config: EnsureConfig,
    ) -> Self {
        Self {
            inventory,
            catalog,
            orchestrator,
            config,
        }
    }

    /// Orchestrator used for the deployment, e.g. to subscribe to progress
    pub fn orchestrator(&self) -> &DeploymentOrchestrator {
        &self.orchestrator
    }

    /// Run the workflow for the device with the given hostname
    ///
    /// Equivalent to [`plan`](Self::plan) followed by [`execute`](Self::execute).
    ///
    /// # Errors
    /// Propagates lookup, resolution, creation and wait errors unchanged.
    pub async fn run(&self, hostname: &str) -> Result<EnsureOutcome, CoreError> {
        let plan = self.plan(hostname).await?;
        self.execute(plan).await
    }

    /// Look the device up and decide whether it needs the latest artifact
    ///
    /// Nothing is created on the backend.
    ///
    /// # Errors
    /// `NotFound` for an unknown host or when no artifact carries a valid version,
    /// otherwise backend errors.
    pub async fn plan(&self, hostname: &str) -> Result<EnsurePlan, CoreError> {
        let device = self.inventory.device_by_hostname(hostname).await?;
        let artifacts = self.catalog.list_artifacts().await?;

        let resolver = VersionResolver::with_key(self.config.version_key.as_str());
        let resolution = resolver.resolve_latest(&artifacts)?;
        let artifact = resolution.artifact_name().to_string();
        let version = resolution.version.raw().to_string();

        info!(
            host = %hostname,
            artifact = %artifact,
            version = %version,
            "latest artifact resolved"
        );

        let installed = match device.attribute(&self.config.version_key) {
            Some(attr) if attr.as_str() == Some(version.as_str()) => {
                info!(
                    host = %hostname,
                    version = %version,
                    "device already has the latest version"
                );
                return Ok(EnsurePlan::UpToDate { artifact, version });
            }
            Some(attr) => {
                let current = attr
                    .as_str()
                    .map_or_else(|| attr.value.to_string(), str::to_string);
                info!(host = %hostname, installed = %current, "device has out-of-date version");
                InstalledVersion::Outdated(current)
            }
            None => {
                info!(host = %hostname, "device does not yet have the artifact");
                InstalledVersion::Missing
            }
        };

        Ok(EnsurePlan::Deploy {
            artifact,
            version,
            installed,
            device_id: device.id,
            deployment: self.config.deployment_name(hostname),
        })
    }

    /// Carry out a plan, deploying and waiting when the device is behind
    ///
    /// The deployment id is announced on the orchestrator's event channel as
    /// soon as it exists, so it stays visible when the wait fails.
    ///
    /// # Errors
    /// Propagates creation and wait errors unchanged.
    pub async fn execute(&self, plan: EnsurePlan) -> Result<EnsureOutcome, CoreError> {
        let (artifact, version, installed, device_id, deployment) = match plan {
            EnsurePlan::UpToDate { artifact, version } => {
                return Ok(EnsureOutcome::UpToDate { artifact, version });
            }
            EnsurePlan::Deploy {
                artifact,
                version,
                installed,
                device_id,
                deployment,
            } => (artifact, version, installed, device_id, deployment),
        };

        let (handle, completion) = self
            .orchestrator
            .deploy(&deployment, &artifact, vec![device_id], self.config.wait)
            .await?;

        Ok(EnsureOutcome::Deployed {
            artifact,
            version,
            installed,
            handle,
            completion,
        })
    }
}
