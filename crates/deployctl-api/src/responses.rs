//! Response types for the management API

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status value reported by the backend once a deployment is done
pub const STATUS_FINISHED: &str = "finished";

/// An artifact known to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub name: String,
    /// Metadata the artifact provides once installed, keyed by provide name
    #[serde(default)]
    pub artifact_provides: HashMap<String, String>,
}

impl ArtifactDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artifact_provides: HashMap::new(),
        }
    }

    /// Attach a provide key/value pair
    #[must_use]
    pub fn with_provide(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.artifact_provides.insert(key.into(), value.into());
        self
    }

    pub fn provide(&self, key: &str) -> Option<&str> {
        self.artifact_provides.get(key).map(String::as_str)
    }
}

/// Point-in-time view of a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSnapshot {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artifact_name: String,
    #[serde(default)]
    pub artifacts: Vec<String>,
    pub status: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished: Option<DateTime<Utc>>,
}

impl DeploymentSnapshot {
    /// Snapshot carrying only a status
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            id: None,
            name: String::new(),
            artifact_name: String::new(),
            artifacts: Vec::new(),
            status: status.into(),
            created: None,
            finished: None,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.status == STATUS_FINISHED
    }
}

/// A device as reported by the inventory service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub attributes: Vec<DeviceAttribute>,
}

impl Device {
    /// First attribute with the given name, in any scope
    pub fn attribute(&self, name: &str) -> Option<&DeviceAttribute> {
        self.attributes.iter().find(|attr| attr.name == name)
    }
}

/// Inventory attribute; values are arbitrary JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAttribute {
    pub name: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub value: Value,
}

impl DeviceAttribute {
    /// Value as a string, if the backend stored it as one
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_without_provides() {
        let artifact: ArtifactDescriptor =
            serde_json::from_str(r#"{"name": "rootfs-2024.01", "size": 1024}"#).unwrap();

        assert_eq!(artifact.name, "rootfs-2024.01");
        assert!(artifact.artifact_provides.is_empty());
        assert_eq!(artifact.provide("data_partition.comms.version"), None);
    }

    #[test]
    fn test_deployment_snapshot_decode() {
        let json = r#"{
            "id": "0a1b2c",
            "name": "comms-rpi4",
            "artifact_name": "comms-1.10.0",
            "status": "inprogress",
            "created": "2024-03-01T10:00:00Z",
            "device_count": 1
        }"#;
        let snapshot: DeploymentSnapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.status, "inprogress");
        assert!(!snapshot.is_finished());
        assert!(snapshot.created.is_some());
        assert!(snapshot.finished.is_none());
    }

    #[test]
    fn test_device_attribute_lookup() {
        let json = r#"{
            "id": "dev-1",
            "attributes": [
                {"name": "hostname", "scope": "identity", "value": "rpi4"},
                {"name": "mem_total_kB", "scope": "inventory", "value": 3884376},
                {"name": "data_partition.comms.version", "scope": "inventory", "value": "1.2.0"}
            ]
        }"#;
        let device: Device = serde_json::from_str(json).unwrap();

        let version = device.attribute("data_partition.comms.version").unwrap();
        assert_eq!(version.as_str(), Some("1.2.0"));
        assert_eq!(device.attribute("mem_total_kB").unwrap().as_str(), None);
        assert!(device.attribute("missing").is_none());
    }
}
