//! `DeploymentOrchestrator`: deployment creation and bounded status polling

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use deployctl_api::events::DeploymentEvent;
use deployctl_api::requests::DeploymentRequest;
use deployctl_api::responses::DeploymentSnapshot;

use crate::backend::DeploymentBackend;
use crate::config::WaitConfig;
use crate::error::CoreError;
use crate::state::DeploymentPhase;

/// Opaque identifier of a deployment on the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentHandle(String);

impl DeploymentHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Successful outcome of [`DeploymentOrchestrator::await_completion`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Waiting was disabled; no status query was issued
    Detached,
    /// The backend reported the deployment as finished
    Finished {
        /// Status queries issued, including the final one
        attempts: u32,
        snapshot: DeploymentSnapshot,
    },
}

/// Per-run tracking state; owned by a single `await_completion` call
struct DeploymentRun<'a> {
    handle: &'a DeploymentHandle,
    phase: DeploymentPhase,
}

impl<'a> DeploymentRun<'a> {
    fn new(handle: &'a DeploymentHandle) -> Self {
        Self {
            handle,
            phase: DeploymentPhase::Created,
        }
    }

    fn transition_to(&mut self, next: DeploymentPhase) -> Result<(), CoreError> {
        if !self.phase.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }

        if self.phase != next {
            debug!(
                deployment = %self.handle,
                from = %self.phase,
                to = %next,
                "phase transition"
            );
        }
        self.phase = next;
        Ok(())
    }
}

/// Creates deployments and tracks them until a terminal status
pub struct DeploymentOrchestrator {
    backend: Arc<dyn DeploymentBackend>,
    /// Progress event sender
    event_tx: broadcast::Sender<DeploymentEvent>,
}

impl DeploymentOrchestrator {
    /// Default progress channel capacity
    pub const EVENT_CAPACITY: usize = 64;

    pub fn new(backend: Arc<dyn DeploymentBackend>) -> Self {
        Self::with_event_capacity(backend, Self::EVENT_CAPACITY)
    }

    pub fn with_event_capacity(backend: Arc<dyn DeploymentBackend>, capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { backend, event_tx }
    }

    /// Get a receiver for progress events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DeploymentEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: DeploymentEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Submit a deployment of `artifact_name` to `device_ids`
    ///
    /// # Errors
    /// `InvalidRequest` for an empty name, artifact or device list, otherwise
    /// whatever the backend reports (`Unauthorized`, `Conflict`, `Backend`).
    #[instrument(skip(self, device_ids), fields(devices = device_ids.len()))]
    pub async fn create(
        &self,
        name: &str,
        artifact_name: &str,
        device_ids: Vec<String>,
    ) -> Result<DeploymentHandle, CoreError> {
        if name.is_empty() {
            return Err(CoreError::InvalidRequest("deployment name is empty".into()));
        }
        if artifact_name.is_empty() {
            return Err(CoreError::InvalidRequest("artifact name is empty".into()));
        }
        if device_ids.is_empty() {
            return Err(CoreError::InvalidRequest(
                "at least one device id is required".into(),
            ));
        }

        let request = DeploymentRequest {
            name: name.to_string(),
            artifact_name: artifact_name.to_string(),
            devices: device_ids,
        };

        let handle = self
            .backend
            .create_deployment(&request)
            .await
            .inspect_err(|e| warn!(error = %e, "deployment creation failed"))?;

        info!(deployment = %handle, "deployment created");
        self.emit(DeploymentEvent::Created {
            deployment: handle.to_string(),
        });

        Ok(handle)
    }

    /// Poll the deployment until it finishes or `wait.max_attempts` queries were made
    ///
    /// Queries are spaced by `wait.poll_interval`. The first failing query ends
    /// the wait with its error.
    ///
    /// # Errors
    /// `Timeout` when no query reported the terminal status, or the error of the
    /// failing query.
    pub async fn await_completion(
        &self,
        handle: &DeploymentHandle,
        wait: WaitConfig,
    ) -> Result<Completion, CoreError> {
        if !wait.is_enabled() {
            info!(deployment = %handle, "not waiting for deployment to finish");
            return Ok(Completion::Detached);
        }

        let mut run = DeploymentRun::new(handle);

        for attempt in 1..=wait.max_attempts {
            let snapshot = match self.backend.get_deployment(handle).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    run.transition_to(DeploymentPhase::Failed)?;
                    error!(deployment = %handle, attempt, error = %e, "failed to get deployment");
                    self.emit(DeploymentEvent::Failed {
                        deployment: handle.to_string(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };

            if snapshot.is_finished() {
                run.transition_to(DeploymentPhase::Finished)?;
                info!(deployment = %handle, attempts = attempt, "deployment finished");
                self.emit(DeploymentEvent::Finished {
                    deployment: handle.to_string(),
                    attempts: attempt,
                });
                return Ok(Completion::Finished {
                    attempts: attempt,
                    snapshot,
                });
            }

            run.transition_to(DeploymentPhase::Polling)?;
            info!(
                deployment = %handle,
                attempt,
                status = %snapshot.status,
                "deployment still in progress"
            );
            self.emit(DeploymentEvent::Progress {
                deployment: handle.to_string(),
                attempt,
                status: snapshot.status,
            });

            if attempt < wait.max_attempts {
                tokio::time::sleep(wait.poll_interval).await;
            }
        }

        run.transition_to(DeploymentPhase::TimedOut)?;
        warn!(
            deployment = %handle,
            attempts = wait.max_attempts,
            "deployment still unfinished"
        );
        self.emit(DeploymentEvent::TimedOut {
            deployment: handle.to_string(),
            attempts: wait.max_attempts,
        });

        Err(CoreError::Timeout {
            attempts: wait.max_attempts,
        })
    }

    /// Create a deployment and wait for it
    ///
    /// # Errors
    /// See [`Self::create`] and [`Self::await_completion`].
    pub async fn deploy(
        &self,
        name: &str,
        artifact_name: &str,
        device_ids: Vec<String>,
        wait: WaitConfig,
    ) -> Result<(DeploymentHandle, Completion), CoreError> {
        let handle = self.create(name, artifact_name, device_ids).await?;
        let completion = self.await_completion(&handle, wait).await?;
        Ok((handle, completion))
    }
}
