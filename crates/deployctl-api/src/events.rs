//! Deployment progress events

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DeploymentEvent {
    Created {
        deployment: String,
    },
    Progress {
        deployment: String,
        attempt: u32,
        status: String,
    },
    Finished {
        deployment: String,
        attempts: u32,
    },
    TimedOut {
        deployment: String,
        attempts: u32,
    },
    Failed {
        deployment: String,
        error: String,
    },
}
