//! Error taxonomy for orchestration operations
//!
//! Every fatal condition an operation can hit is a variant of [`Error`].
//! Per-resource partial failures during aggregation are not errors; they
//! are reported as [`Warning`] values alongside the results.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Boxed source error from the control-plane collaborator
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the library
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by orchestration operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The named service has no record (in one cluster, or in any cluster)
    #[error("{}", service_not_found_message(.service, .cluster.as_deref()))]
    ServiceNotFound {
        service: String,
        cluster: Option<String>,
    },

    #[error("service {service:?} has no resolvable task definition{}", .revision.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    MissingTaskDefinition {
        service: String,
        revision: Option<String>,
    },

    #[error("task definition {revision:?} has no container definitions")]
    EmptyContainerSet { revision: String },

    #[error("container {container:?} not found in task definition {revision:?}")]
    ContainerNotFound { container: String, revision: String },

    #[error("no clusters found in the account")]
    NoClustersFound,

    #[error("service {service:?} has no load balancer target group attached")]
    LoadBalancerNotFound { service: String },

    #[error("target group {arn:?} not found or not attached to a load balancer")]
    TargetGroupNotFound { arn: String },

    /// A required input was empty or inconsistent
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("deployment of {revision} did not converge: timed out after {}s", .elapsed.as_secs())]
    ConvergenceTimeout { revision: String, elapsed: Duration },

    #[error("cannot derive resource label from {arn:?}: {reason}")]
    LabelExtractionFailed { arn: String, reason: String },

    /// The collaborator API returned a transport or service error
    #[error("{operation}: {source}")]
    Upstream {
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("operation cancelled")]
    Cancelled,
}

fn service_not_found_message(service: &str, cluster: Option<&str>) -> String {
    match cluster {
        Some(cluster) => format!("service {service:?} not found in cluster {cluster:?}"),
        None => format!("service {service:?} not found in any cluster"),
    }
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    ConvergenceTimeout,
    LabelExtraction,
    Upstream,
    Cancelled,
}

impl Error {
    /// Wrap a collaborator failure with the name of the call that produced it
    pub fn upstream(operation: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Upstream {
            operation: operation.into(),
            source: source.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ServiceNotFound { .. }
            | Error::MissingTaskDefinition { .. }
            | Error::EmptyContainerSet { .. }
            | Error::ContainerNotFound { .. }
            | Error::NoClustersFound
            | Error::LoadBalancerNotFound { .. }
            | Error::TargetGroupNotFound { .. } => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::ConvergenceTimeout { .. } => ErrorKind::ConvergenceTimeout,
            Error::LabelExtractionFailed { .. } => ErrorKind::LabelExtraction,
            Error::Upstream { .. } => ErrorKind::Upstream,
            Error::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// A per-resource failure that did not abort the surrounding operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Identifier of the resource that failed (ARN or name)
    pub resource: String,
    pub reason: String,
}

impl Warning {
    pub fn new(resource: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.resource, self.reason)
    }
}
