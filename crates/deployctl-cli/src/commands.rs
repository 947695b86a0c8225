//! Command implementations

use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use eyre::WrapErr;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use deployctl_api::events::DeploymentEvent;
use deployctl_client::HttpClient;
use deployctl_core::{
    Completion, DeploymentHandle, DeploymentOrchestrator, EnsureConfig, EnsureLatest,
    EnsureOutcome, EnsurePlan, InstalledVersion, VersionResolver, WaitConfig,
};

/// `artifact latest`
pub async fn latest_artifact(client: &HttpClient, version_key: &str) -> Result<()> {
    let artifacts = client
        .list_artifacts()
        .await
        .wrap_err("failed to list artifacts")?;

    let resolver = VersionResolver::with_key(version_key);
    let latest = resolver
        .resolve_latest(&artifacts)
        .wrap_err("failed to find latest artifact")?;

    println!(
        "latest artifact is: {} ({})",
        latest.artifact_name(),
        latest.version
    );
    Ok(())
}

/// `device get`
pub async fn get_device(client: &HttpClient, hostname: &str) -> Result<()> {
    let device = client
        .get_device_by_hostname(hostname)
        .await
        .wrap_err("failed to get device")?;

    println!("id: {}", device.id);
    for attr in &device.attributes {
        let value = attr
            .as_str()
            .map_or_else(|| attr.value.to_string(), str::to_string);
        println!("{} ({}): {value}", attr.name, attr.scope);
    }
    Ok(())
}

/// `deployment create`
pub async fn create_deployment(
    client: HttpClient,
    name: &str,
    artifact: &str,
    device: &str,
    wait: WaitConfig,
) -> Result<()> {
    let orchestrator = DeploymentOrchestrator::new(Arc::new(client));
    let printer = spawn_progress_printer(orchestrator.subscribe(), wait);

    let result = async {
        let handle = orchestrator
            .create(name, artifact, vec![device.to_string()])
            .await
            .wrap_err("failed to create deployment")?;

        let completion = orchestrator
            .await_completion(&handle, wait)
            .await
            .wrap_err("failed to wait for deployment")?;
        Ok::<_, eyre::Report>((handle, completion))
    }
    .await;

    drop(orchestrator);
    let _ = printer.await;

    let (handle, completion) = result?;
    report_completion(&handle, &completion);
    Ok(())
}

/// `ensure`
pub async fn ensure(client: HttpClient, hostname: &str, config: EnsureConfig) -> Result<()> {
    let wait = config.wait;
    let client = Arc::new(client);
    let workflow = EnsureLatest::new(
        client.clone(),
        client.clone(),
        DeploymentOrchestrator::new(client),
        config,
    );

    let plan = workflow
        .plan(hostname)
        .await
        .wrap_err_with(|| format!("failed to ensure latest version on {hostname}"))?;
    for line in plan_lines(&plan) {
        println!("{line}");
    }

    let printer = spawn_progress_printer(workflow.orchestrator().subscribe(), wait);
    let result = workflow.execute(plan).await;

    drop(workflow);
    let _ = printer.await;

    let outcome =
        result.wrap_err_with(|| format!("failed to ensure latest version on {hostname}"))?;
    if let EnsureOutcome::Deployed {
        handle, completion, ..
    } = outcome
    {
        report_completion(&handle, &completion);
    }
    Ok(())
}

/// Resolution and installed state, printed before anything is deployed
fn plan_lines(plan: &EnsurePlan) -> Vec<String> {
    let mut lines = vec![format!(
        "latest artifact name and version: {} / {}",
        plan.artifact(),
        plan.version()
    )];
    match plan {
        EnsurePlan::UpToDate { .. } => {
            lines.push("device already has the latest version -- ok".to_string());
        }
        EnsurePlan::Deploy { installed, .. } => lines.push(match installed {
            InstalledVersion::Missing => "device did not have the artifact".to_string(),
            InstalledVersion::Outdated(current) => {
                format!("device had out-of-date version: {current}")
            }
        }),
    }
    lines
}

fn report_completion(handle: &DeploymentHandle, completion: &Completion) {
    match completion {
        Completion::Detached => {
            println!("not waiting for deployment {handle} to finish");
        }
        Completion::Finished { attempts, .. } => {
            println!("deployment finished after {attempts} status checks");
        }
    }
}

/// Print progress events until the orchestrator is dropped
fn spawn_progress_printer(
    mut rx: broadcast::Receiver<DeploymentEvent>,
    wait: WaitConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = progress_line(&event, wait) {
                        println!("{line}");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn progress_line(event: &DeploymentEvent, wait: WaitConfig) -> Option<String> {
    match event {
        DeploymentEvent::Created { deployment } => Some(format!("deployment id: {deployment}")),
        DeploymentEvent::Progress {
            status, attempt, ..
        } if *attempt < wait.max_attempts => Some(format!(
            "deployment status is still {status} ... checking again in {}",
            describe_interval(wait.poll_interval)
        )),
        DeploymentEvent::Progress { status, .. } => {
            Some(format!("deployment status is still {status}"))
        }
        DeploymentEvent::TimedOut { attempts, .. } => Some(format!(
            "deployment still unfinished after {attempts} status checks"
        )),
        _ => None,
    }
}

fn describe_interval(interval: Duration) -> String {
    match interval.as_secs() {
        60 => "one minute".to_string(),
        secs if secs > 0 && secs % 60 == 0 => format!("{} minutes", secs / 60),
        1 => "one second".to_string(),
        secs if secs > 0 => format!("{secs} seconds"),
        _ => format!("{}ms", interval.as_millis()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_line() {
        let event = DeploymentEvent::Progress {
            deployment: "d1".into(),
            attempt: 3,
            status: "inprogress".into(),
        };
        assert_eq!(
            progress_line(&event, WaitConfig::default()).unwrap(),
            "deployment status is still inprogress ... checking again in one minute"
        );
        assert_eq!(
            progress_line(&event, WaitConfig::new(3, Duration::from_secs(60))).unwrap(),
            "deployment status is still inprogress"
        );

        let event = DeploymentEvent::Finished {
            deployment: "d1".into(),
            attempts: 2,
        };
        assert!(progress_line(&event, WaitConfig::default()).is_none());
    }

    #[test]
    fn test_created_event_prints_deployment_id() {
        let event = DeploymentEvent::Created {
            deployment: "dep-42".into(),
        };
        assert_eq!(
            progress_line(&event, WaitConfig::detached()).unwrap(),
            "deployment id: dep-42"
        );
    }

    #[test]
    fn test_plan_lines() {
        let plan = EnsurePlan::Deploy {
            artifact: "comms-1.10.0".into(),
            version: "1.10.0".into(),
            installed: InstalledVersion::Missing,
            device_id: "dev-1".into(),
            deployment: "comms-rpi4".into(),
        };
        assert_eq!(
            plan_lines(&plan),
            vec![
                "latest artifact name and version: comms-1.10.0 / 1.10.0",
                "device did not have the artifact",
            ]
        );

        let plan = EnsurePlan::Deploy {
            artifact: "comms-1.10.0".into(),
            version: "1.10.0".into(),
            installed: InstalledVersion::Outdated("1.2.0".into()),
            device_id: "dev-1".into(),
            deployment: "comms-rpi4".into(),
        };
        assert_eq!(plan_lines(&plan)[1], "device had out-of-date version: 1.2.0");

        let plan = EnsurePlan::UpToDate {
            artifact: "comms-1.10.0".into(),
            version: "1.10.0".into(),
        };
        assert_eq!(
            plan_lines(&plan)[1],
            "device already has the latest version -- ok"
        );
    }

    #[test]
    fn test_describe_interval() {
        assert_eq!(describe_interval(Duration::from_secs(120)), "2 minutes");
        assert_eq!(describe_interval(Duration::from_secs(1)), "one second");
        assert_eq!(describe_interval(Duration::from_secs(45)), "45 seconds");
        assert_eq!(describe_interval(Duration::from_millis(250)), "250ms");
    }
}
