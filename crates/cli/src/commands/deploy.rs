//! Deployment commands

use super::Session;
use crate::output::{print_info, print_json, print_success, OutputFormat};
use anyhow::{Context, Result};
use nami_lib::{DeployRequest, PinRequest};
use serde_json::json;
use std::time::{Duration, Instant};

/// Flags of `nami deploy`
pub struct DeployArgs {
    pub cluster: Option<String>,
    pub service: String,
    pub container_name: Option<String>,
    pub image: String,
    pub wait: bool,
    pub timeout: Option<u64>,
}

/// Flags of `nami update revision`
pub struct PinArgs {
    pub cluster: Option<String>,
    pub service: String,
    pub revision: u32,
    pub force: bool,
    pub wait: bool,
    pub timeout: Option<u64>,
}

/// Register a new revision with the image and roll the service onto it
pub async fn deploy(session: &Session, args: DeployArgs) -> Result<()> {
    let request = DeployRequest {
        cluster: session.cluster(args.cluster)?,
        service: args.service,
        container_name: args.container_name.filter(|name| !name.is_empty()),
        image: args.image,
        wait: args.wait,
        timeout: args.timeout.map(Duration::from_secs),
    };

    let started = Instant::now();
    let revision = session
        .orchestrator()
        .deploy(&request)
        .await
        .with_context(|| format!("Failed to deploy {}", request.service))?;

    session.logger.log_deployment(
        &request.cluster,
        &request.service,
        &revision,
        request.wait,
        started.elapsed(),
    );

    report(session.format, &request.cluster, &request.service, &revision, request.wait)
}

/// Point a service at an existing revision of its family
pub async fn update_revision(session: &Session, args: PinArgs) -> Result<()> {
    let request = PinRequest {
        cluster: session.cluster(args.cluster)?,
        service: args.service,
        revision: args.revision,
        force_new_deployment: args.force,
        wait: args.wait,
        timeout: args.timeout.map(Duration::from_secs),
    };

    let started = Instant::now();
    let revision = session
        .orchestrator()
        .pin_revision(&request)
        .await
        .with_context(|| format!("Failed to update revision of {}", request.service))?;

    session.logger.log_deployment(
        &request.cluster,
        &request.service,
        &revision,
        request.wait,
        started.elapsed(),
    );

    report(session.format, &request.cluster, &request.service, &revision, request.wait)
}

// Stdout carries only the revision (or one JSON object); chatter goes to stderr.
fn report(format: OutputFormat, cluster: &str, service: &str, revision: &str, waited: bool) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "cluster": cluster,
            "service": service,
            "revision": revision,
            "converged": waited,
        }))?,
        OutputFormat::Table => {
            if waited {
                print_success(&format!("{} converged on the new revision", service));
            } else {
                print_info(&format!("Rollout of {} started", service));
            }
            println!("{}", revision);
        }
    }
    Ok(())
}
