//! Orchestration library for container services
//!
//! This crate provides the core functionality for:
//! - Rolling deployments with convergence tracking
//! - Concurrent fleet-state aggregation
//! - Autoscaling policy registration
//! - Resource name and ARN parsing
//! - A control-plane client facade with an AWS implementation

pub mod abort;
pub mod arn;
pub mod autoscale;
pub mod client;
pub mod deploy;
pub mod error;
pub mod fleet;
pub mod models;
pub mod observability;

#[cfg(test)]
pub(crate) mod testing;

pub use abort::{abort_pair, AbortHandle, AbortSignal};
pub use autoscale::{ScalingOutcome, ScalingPolicyRegistrar, ScalingRequest};
pub use client::{AwsControlPlane, AwsOptions, ControlPlane};
pub use deploy::{DeployRequest, DeploymentOrchestrator, PinRequest, PollerConfig};
pub use error::{Error, ErrorKind, Result, Warning};
pub use fleet::FleetAggregator;
pub use models::*;
pub use observability::{init_tracing, LogFormat, OperationLogger};
