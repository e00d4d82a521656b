//! Logging setup and structured operation events
//!
//! Diagnostics go to stderr so stdout stays machine-consumable.

use crate::autoscale::ScalingOutcome;
use crate::error::Warning;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVES: &str = "warn";
const VERBOSE_DIRECTIVES: &str = "warn,nami=debug,nami_lib=debug";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Install the global subscriber
///
/// `RUST_LOG` applies unless `verbose` is set. Returns `false` if a
/// subscriber was already installed.
pub fn init_tracing(verbose: bool, format: LogFormat) -> bool {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_DIRECTIVES)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES))
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    installed.is_ok()
}

/// Structured events for completed operations
///
/// One event per operation, tagged with the region it ran against.
#[derive(Debug, Clone)]
pub struct OperationLogger {
    region: String,
}

impl OperationLogger {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn log_deployment(
        &self,
        cluster: &str,
        service: &str,
        revision: &str,
        waited: bool,
        elapsed: Duration,
    ) {
        info!(
            event = "deployment_started",
            region = %self.region,
            cluster = %cluster,
            service = %service,
            revision = %revision,
            waited = waited,
            elapsed_ms = elapsed.as_millis() as u64,
            "Deployment submitted"
        );
    }

    pub fn log_scaling(&self, outcome: &ScalingOutcome) {
        let policies: Vec<&str> = outcome.policies.iter().map(|p| p.name.as_str()).collect();
        info!(
            event = "autoscaling_configured",
            region = %self.region,
            resource_id = %outcome.resource_id,
            min = outcome.min_capacity,
            max = outcome.max_capacity,
            policies = ?policies,
            "Autoscaling configured"
        );
    }

    pub fn log_report(&self, report: &str, records: usize, warnings: &[Warning]) {
        if warnings.is_empty() {
            info!(
                event = "report_complete",
                region = %self.region,
                report = %report,
                records = records,
                "Report complete"
            );
        } else {
            warn!(
                event = "report_partial",
                region = %self.region,
                report = %report,
                records = records,
                warnings = warnings.len(),
                "Report complete with partial failures"
            );
        }
    }
}
