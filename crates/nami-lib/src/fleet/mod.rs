//! Concurrent fleet-state aggregation
//!
//! All reports share one bounded fan-out engine. Partial failures are
//! collected as warnings next to the results instead of aborting.

mod fanout;
mod revisions;
mod scaling;
mod services;

pub use fanout::{FanOut, FanOutReport, DEFAULT_CONCURRENCY};
pub use revisions::{RevisionRecord, RevisionReport};
pub use scaling::{ScalingOverviewRecord, ScalingReport, TrackingTarget};
pub use services::{AggregatedServiceRecord, ServiceReport};

use crate::abort::AbortSignal;
use crate::arn;
use crate::client::ControlPlane;
use crate::models::ServiceState;
use std::fmt;
use std::sync::Arc;

/// Builds fleet reports over a shared control plane
pub struct FleetAggregator {
    client: Arc<dyn ControlPlane>,
    concurrency: usize,
    abort: AbortSignal,
}

impl FleetAggregator {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
            abort: AbortSignal::never(),
        }
    }

    /// Maximum number of in-flight workers per fan-out
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_abort(mut self, abort: AbortSignal) -> Self {
        self.abort = abort;
        self
    }

    fn fanout(&self) -> FanOut {
        FanOut::new(self.concurrency).with_abort(self.abort.clone())
    }
}

/// A described service handed to a worker, labelled `cluster/service`
struct ServiceRef {
    state: ServiceState,
}

impl From<ServiceState> for ServiceRef {
    fn from(state: ServiceState) -> Self {
        Self { state }
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            arn::cluster_name(&self.state.cluster_arn),
            self.state.service_name
        )
    }
}
