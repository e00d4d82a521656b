//! Rolling deployment orchestration
//!
//! This module provides:
//! - Image mutation of the active task definition revision
//! - Service update onto the new revision
//! - A convergence state machine with an injectable time source

mod clock;
mod mutator;
mod orchestrator;
mod poller;

pub use clock::{Clock, TokioClock};
pub use mutator::{RegisteredRevision, TaskDefinitionMutator};
pub use orchestrator::{DeployRequest, DeploymentOrchestrator, PinRequest};
pub use poller::{
    is_stable, ConvergencePoller, PollState, PollerConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};

#[cfg(test)]
pub use clock::ManualClock;
