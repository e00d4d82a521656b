//! Deployment convergence state machine
//!
//! A rollout is stable once no deployment is still in progress, exactly one
//! PRIMARY deployment runs the new revision, and running == desired.
//! `Converged`, `TimedOut` and `Failed` are terminal.

use super::clock::Clock;
use crate::abort::AbortSignal;
use crate::arn::TaskDefinitionRef;
use crate::client::ControlPlane;
use crate::error::{Error, Result};
use crate::models::{DeploymentStatus, ServiceState};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollState {
    Polling,
    Converged,
    TimedOut,
    Failed,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Polling)
    }
}

/// Poll cadence and deadline
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Decides from successive snapshots whether a rollout has stabilized
#[derive(Debug, Clone)]
pub struct ConvergencePoller {
    revision: String,
    state: PollState,
    polls: u32,
}

impl ConvergencePoller {
    /// Start polling for `revision` (ARN or `family:revision`)
    pub fn new(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            state: PollState::Polling,
            polls: 0,
        }
    }

    pub fn state(&self) -> PollState {
        self.state
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// Number of snapshots observed so far
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Feed one snapshot
    pub fn observe(&mut self, snapshot: &ServiceState) -> PollState {
        if self.state.is_terminal() {
            return self.state;
        }

        self.polls += 1;
        if is_stable(snapshot, &self.revision) {
            self.state = PollState::Converged;
        }
        self.state
    }

    pub fn time_out(&mut self) -> PollState {
        if !self.state.is_terminal() {
            self.state = PollState::TimedOut;
        }
        self.state
    }

    pub fn fail(&mut self) -> PollState {
        if !self.state.is_terminal() {
            self.state = PollState::Failed;
        }
        self.state
    }

    /// Poll the service until it converges, the deadline passes, or a describe fails
    ///
    /// The first describe happens one interval after the call. The deadline
    /// is checked before each tick; a describe in flight at the deadline gets
    /// at most one more interval to answer.
    pub async fn wait(
        &mut self,
        client: &dyn ControlPlane,
        clock: &dyn Clock,
        abort: &AbortSignal,
        cluster: &str,
        service: &str,
        config: &PollerConfig,
    ) -> Result<String> {
        let started = clock.elapsed();
        let elapsed = || clock.elapsed().saturating_sub(started);

        info!(
            cluster,
            service,
            revision = %self.revision,
            timeout_secs = config.timeout.as_secs(),
            "Waiting for deployment to converge"
        );

        while !self.state.is_terminal() {
            let remaining = config.timeout.saturating_sub(elapsed());
            if remaining.is_zero() {
                break;
            }

            let tick = config.interval.min(remaining);
            tokio::select! {
                biased;
                _ = abort.aborted() => {
                    self.fail();
                    return Err(Error::Cancelled);
                }
                _ = clock.sleep(tick) => {}
            }

            // Deadline reached before the next full tick
            if tick < config.interval {
                continue;
            }

            // A describe issued at the deadline may still take one interval
            let budget = config.timeout.saturating_sub(elapsed()).max(config.interval);
            let snapshot = tokio::select! {
                biased;
                result = client.describe_service(cluster, service) => result,
                _ = abort.aborted() => {
                    self.fail();
                    return Err(Error::Cancelled);
                }
                _ = clock.sleep(budget) => continue,
            };

            match snapshot {
                Ok(Some(snapshot)) => {
                    if self.observe(&snapshot) == PollState::Converged {
                        info!(
                            cluster,
                            service,
                            revision = %self.revision,
                            polls = self.polls,
                            elapsed_ms = elapsed().as_millis() as u64,
                            "Deployment converged"
                        );
                        return Ok(self.revision.clone());
                    }

                    debug!(
                        service,
                        running = snapshot.running_count,
                        desired = snapshot.desired_count,
                        deployments = snapshot.deployments.len(),
                        "Deployment not yet stable"
                    );
                }
                Ok(None) => {
                    self.fail();
                    return Err(Error::ServiceNotFound {
                        service: service.to_string(),
                        cluster: Some(cluster.to_string()),
                    });
                }
                Err(err) => {
                    self.fail();
                    warn!(service, error = %err, "Describe failed while waiting for deployment");
                    return Err(err);
                }
            }
        }

        self.time_out();
        let elapsed = elapsed();
        warn!(
            service,
            revision = %self.revision,
            elapsed_ms = elapsed.as_millis() as u64,
            "Deployment did not converge before the deadline"
        );
        Err(Error::ConvergenceTimeout {
            revision: self.revision.clone(),
            elapsed,
        })
    }
}

/// Stability rule applied to a single snapshot
pub fn is_stable(snapshot: &ServiceState, revision: &str) -> bool {
    let in_progress = snapshot.deployments.iter().any(|d| {
        d.status == DeploymentStatus::InProgress || d.rollout_state.as_deref() == Some("IN_PROGRESS")
    });
    if in_progress {
        return false;
    }

    let primaries = snapshot
        .deployments
        .iter()
        .filter(|d| d.status == DeploymentStatus::Primary && same_revision(&d.task_definition, revision))
        .count();
    if primaries != 1 {
        return false;
    }

    snapshot.running_count == snapshot.desired_count
}

/// Compare revisions given as ARN or `family:revision`
fn same_revision(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }

    match (TaskDefinitionRef::parse(a), TaskDefinitionRef::parse(b)) {
        (Some(a), Some(b)) => a.revision.is_some() && a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{deployment, steady_service, task_definition_arn};

    #[test]
    fn test_requires_primary_on_new_revision() {
        let new = task_definition_arn("web", 2);
        let snapshot = steady_service("prod", "api", "web", 1);
        assert!(!is_stable(&snapshot, &new));

        let snapshot = steady_service("prod", "api", "web", 2);
        assert!(is_stable(&snapshot, &new));
        assert!(is_stable(&snapshot, "web:2"));
    }

    #[test]
    fn test_in_progress_blocks_convergence() {
        let new = task_definition_arn("web", 2);
        let mut snapshot = steady_service("prod", "api", "web", 2);
        snapshot
            .deployments
            .push(deployment(&task_definition_arn("web", 1), DeploymentStatus::InProgress));
        assert!(!is_stable(&snapshot, &new));

        let mut snapshot = steady_service("prod", "api", "web", 2);
        snapshot.deployments[0].rollout_state = Some("IN_PROGRESS".to_string());
        assert!(!is_stable(&snapshot, &new));
    }

    #[test]
    fn test_zero_counts_alone_do_not_converge() {
        let mut snapshot = steady_service("prod", "api", "web", 1);
        snapshot.desired_count = 0;
        snapshot.running_count = 0;
        assert!(!is_stable(&snapshot, &task_definition_arn("web", 2)));
    }

    #[test]
    fn test_count_mismatch_is_not_stable() {
        let mut snapshot = steady_service("prod", "api", "web", 2);
        snapshot.running_count = 1;
        assert!(!is_stable(&snapshot, &task_definition_arn("web", 2)));
    }

    #[test]
    fn test_terminal_states_absorb() {
        let new = task_definition_arn("web", 2);
        let mut poller = ConvergencePoller::new(new);

        assert_eq!(poller.observe(&steady_service("prod", "api", "web", 1)), PollState::Polling);
        assert_eq!(poller.observe(&steady_service("prod", "api", "web", 2)), PollState::Converged);
        assert_eq!(poller.time_out(), PollState::Converged);
        assert_eq!(poller.fail(), PollState::Converged);
        assert_eq!(poller.observe(&steady_service("prod", "api", "web", 1)), PollState::Converged);
        assert_eq!(poller.polls(), 2);

        let mut poller = ConvergencePoller::new("web:2");
        assert_eq!(poller.time_out(), PollState::TimedOut);
        assert_eq!(poller.observe(&steady_service("prod", "api", "web", 2)), PollState::TimedOut);
    }

    #[test]
    fn test_same_revision() {
        assert!(same_revision(&task_definition_arn("web", 3), "web:3"));
        assert!(!same_revision(&task_definition_arn("web", 3), "web:4"));
        assert!(!same_revision("web", "web:4"));
    }
}
