//! Command implementations

pub mod autoscaling;
pub mod deploy;
pub mod revisions;
pub mod services;

use crate::config::Config;
use crate::output::OutputFormat;
use anyhow::{bail, Result};
use nami_lib::{
    AbortSignal, ControlPlane, DeploymentOrchestrator, FleetAggregator, OperationLogger,
    PollerConfig, ScalingPolicyRegistrar,
};
use std::sync::Arc;

/// Everything a command needs, built once per process
pub struct Session {
    pub client: Arc<dyn ControlPlane>,
    pub abort: AbortSignal,
    pub config: Config,
    pub format: OutputFormat,
    pub logger: OperationLogger,
}

impl Session {
    pub fn orchestrator(&self) -> DeploymentOrchestrator {
        DeploymentOrchestrator::new(self.client.clone())
            .with_abort(self.abort.clone())
            .with_config(PollerConfig {
                interval: self.config.poll_interval(),
                timeout: self.config.default_timeout(),
            })
    }

    pub fn aggregator(&self) -> FleetAggregator {
        FleetAggregator::new(self.client.clone())
            .with_concurrency(self.config.concurrency)
            .with_abort(self.abort.clone())
    }

    pub fn registrar(&self) -> ScalingPolicyRegistrar {
        ScalingPolicyRegistrar::new(self.client.clone())
    }

    /// The given cluster, else the configured default
    pub fn cluster(&self, flag: Option<String>) -> Result<String> {
        match flag.or_else(|| self.config.default_cluster.clone()) {
            Some(cluster) if !cluster.trim().is_empty() => Ok(cluster),
            _ => bail!("no cluster given; pass --cluster or set default_cluster"),
        }
    }

    /// The given clusters, else the configured default, else every cluster
    pub fn clusters(&self, flags: Vec<String>) -> Vec<String> {
        if !flags.is_empty() {
            return flags;
        }
        self.config.default_cluster.iter().cloned().collect()
    }
}
