//! Deployment lifecycle state machine

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phases of a tracked deployment, from the orchestrator's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentPhase {
    /// Creation succeeded, no status query issued yet
    Created,
    /// At least one status query returned a non-terminal status
    Polling,
    /// Backend reported the terminal status
    Finished,
    /// Attempts exhausted without reaching the terminal status
    TimedOut,
    /// A status query failed
    Failed,
}

impl DeploymentPhase {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            DeploymentPhase::Finished | DeploymentPhase::TimedOut | DeploymentPhase::Failed
        )
    }

    /// Check whether moving to `next` is allowed
    #[must_use]
    pub fn can_transition_to(self, next: DeploymentPhase) -> bool {
        use DeploymentPhase::{Created, Failed, Finished, Polling, TimedOut};

        matches!(
            (self, next),
            (Created | Polling, Polling | Finished | TimedOut | Failed)
        )
    }
}

impl fmt::Display for DeploymentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentPhase::Created => "created",
            DeploymentPhase::Polling => "polling",
            DeploymentPhase::Finished => "finished",
            DeploymentPhase::TimedOut => "timed_out",
            DeploymentPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}
