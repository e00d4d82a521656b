//! Service rollout orchestration

use super::clock::{Clock, TokioClock};
use super::mutator::TaskDefinitionMutator;
use super::poller::{ConvergencePoller, PollerConfig};
use crate::abort::AbortSignal;
use crate::arn::TaskDefinitionRef;
use crate::client::ControlPlane;
use crate::error::{Error, Result};
use crate::models::ServiceUpdate;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Roll a service onto a new container image
#[derive(Debug, Clone, Default)]
pub struct DeployRequest {
    pub cluster: String,
    pub service: String,
    /// Empty or absent targets the first container
    pub container_name: Option<String>,
    pub image: String,
    pub wait: bool,
    /// Zero or absent uses the configured default
    pub timeout: Option<Duration>,
}

/// Repoint a service at an existing revision of its family
#[derive(Debug, Clone, Default)]
pub struct PinRequest {
    pub cluster: String,
    pub service: String,
    pub revision: u32,
    pub force_new_deployment: bool,
    pub wait: bool,
    pub timeout: Option<Duration>,
}

/// Drives mutation, service update and optional convergence wait
pub struct DeploymentOrchestrator {
    client: Arc<dyn ControlPlane>,
    mutator: TaskDefinitionMutator,
    clock: Arc<dyn Clock>,
    abort: AbortSignal,
    config: PollerConfig,
}

impl DeploymentOrchestrator {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self {
            mutator: TaskDefinitionMutator::new(client.clone()),
            client,
            clock: Arc::new(TokioClock::new()),
            abort: AbortSignal::never(),
            config: PollerConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a revision with the new image and point the service at it
    ///
    /// Returns the new revision ARN, after convergence when `wait` is set.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<String> {
        require("cluster", &request.cluster)?;
        require("service", &request.service)?;
        require("image", &request.image)?;

        let registered = self
            .mutator
            .mutate(
                &request.cluster,
                &request.service,
                request.container_name.as_deref(),
                &request.image,
            )
            .await?;

        self.client
            .update_service(&ServiceUpdate {
                cluster: request.cluster.clone(),
                service: request.service.clone(),
                task_definition: Some(registered.arn.clone()),
                force_new_deployment: false,
            })
            .await?;

        info!(
            cluster = %request.cluster,
            service = %request.service,
            revision = %registered.arn,
            wait = request.wait,
            "Service updated to new revision"
        );

        if !request.wait {
            return Ok(registered.arn);
        }

        self.await_convergence(&request.cluster, &request.service, registered.arn, request.timeout)
            .await
    }

    /// Point the service at `family:revision` of its current family
    ///
    /// Returns the `family:revision` reference the service was updated to.
    pub async fn pin_revision(&self, request: &PinRequest) -> Result<String> {
        require("cluster", &request.cluster)?;
        require("service", &request.service)?;
        if request.revision == 0 {
            return Err(Error::validation("revision must be a positive number"));
        }

        let state = self
            .client
            .describe_service(&request.cluster, &request.service)
            .await?
            .ok_or_else(|| Error::ServiceNotFound {
                service: request.service.clone(),
                cluster: Some(request.cluster.clone()),
            })?;

        let current = state
            .task_definition
            .as_deref()
            .and_then(TaskDefinitionRef::parse)
            .ok_or_else(|| Error::MissingTaskDefinition {
                service: request.service.clone(),
                revision: state.task_definition.clone(),
            })?;

        let target = TaskDefinitionRef::with_revision(current.family, request.revision).to_string();

        self.client
            .update_service(&ServiceUpdate {
                cluster: request.cluster.clone(),
                service: request.service.clone(),
                task_definition: Some(target.clone()),
                force_new_deployment: request.force_new_deployment,
            })
            .await?;

        info!(
            cluster = %request.cluster,
            service = %request.service,
            revision = %target,
            force = request.force_new_deployment,
            "Service pinned to revision"
        );

        if !request.wait {
            return Ok(target);
        }

        self.await_convergence(&request.cluster, &request.service, target, request.timeout)
            .await
    }

    async fn await_convergence(
        &self,
        cluster: &str,
        service: &str,
        revision: String,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let config = PollerConfig {
            interval: self.config.interval,
            timeout: timeout
                .filter(|t| !t.is_zero())
                .unwrap_or(self.config.timeout),
        };

        ConvergencePoller::new(revision)
            .wait(
                self.client.as_ref(),
                self.clock.as_ref(),
                &self.abort,
                cluster,
                service,
                &config,
            )
            .await
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} must not be empty")));
    }
    Ok(())
}
