//! Run-scoped settings for resolution and deployment tracking

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provide key carrying the comms version of an artifact
pub const COMMS_VERSION_KEY: &str = "data_partition.comms.version";

/// Bounded wait applied after a deployment is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    /// Maximum number of status queries; 0 disables waiting
    pub max_attempts: u32,
    /// Pause between two consecutive status queries
    pub poll_interval: Duration,
}

impl WaitConfig {
    pub fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            max_attempts,
            poll_interval,
        }
    }

    /// Return right after creation and leave tracking to the caller
    #[must_use]
    pub fn detached() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 32,
            poll_interval: Duration::from_secs(60),
        }
    }
}

/// Settings for the ensure-latest workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsureConfig {
    /// Provide key and device attribute holding the version
    pub version_key: String,
    /// Prefix of the deployment name; the hostname is appended
    pub deployment_prefix: String,
    pub wait: WaitConfig,
}

impl EnsureConfig {
    /// Deployment name used for a given device hostname
    pub fn deployment_name(&self, hostname: &str) -> String {
        format!("{}-{hostname}", self.deployment_prefix)
    }
}

impl Default for EnsureConfig {
    fn default() -> Self {
        Self {
            version_key: COMMS_VERSION_KEY.to_string(),
            deployment_prefix: "comms".to_string(),
            wait: WaitConfig::default(),
        }
    }
}
