//! Request types for the management API

use serde::{Deserialize, Serialize};

/// Body of a deployment creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub name: String,
    pub artifact_name: String,
    pub devices: Vec<String>,
}

impl DeploymentRequest {
    /// Create a request targeting a single device
    pub fn single(
        name: impl Into<String>,
        artifact_name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            artifact_name: artifact_name.into(),
            devices: vec![device_id.into()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = DeploymentRequest::single("comms-rpi4", "comms-1.2.0", "dev-1");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "name": "comms-rpi4",
                "artifact_name": "comms-1.2.0",
                "devices": ["dev-1"]
            })
        );
    }
}
