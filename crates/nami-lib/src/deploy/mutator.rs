//! Task definition image mutation
//!
//! A new image always produces a new immutable revision. Only the target
//! container's image changes; everything else is carried over from the
//! revision the service currently runs.

use crate::client::ControlPlane;
use crate::error::{Error, Result};
use crate::models::{ServiceState, TaskDefinitionDraft, TaskDefinitionRevision};
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of a successful mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRevision {
    /// ARN of the newly registered revision
    pub arn: String,
    /// ARN of the revision it was derived from
    pub previous: String,
    /// Container whose image was replaced
    pub container: String,
}

/// Clones the active revision of a service with one container image replaced
pub struct TaskDefinitionMutator {
    client: Arc<dyn ControlPlane>,
}

impl TaskDefinitionMutator {
    pub fn new(client: Arc<dyn ControlPlane>) -> Self {
        Self { client }
    }

    /// Look up the service and the revision it currently runs
    pub async fn resolve_active(
        &self,
        cluster: &str,
        service: &str,
    ) -> Result<(ServiceState, TaskDefinitionRevision)> {
        let state = self
            .client
            .describe_service(cluster, service)
            .await?
            .ok_or_else(|| Error::ServiceNotFound {
                service: service.to_string(),
                cluster: Some(cluster.to_string()),
            })?;

        let current = state
            .task_definition
            .clone()
            .filter(|td| !td.is_empty())
            .ok_or_else(|| Error::MissingTaskDefinition {
                service: service.to_string(),
                revision: None,
            })?;

        let revision = self
            .client
            .describe_task_definition(&current)
            .await?
            .ok_or_else(|| Error::MissingTaskDefinition {
                service: service.to_string(),
                revision: Some(current.clone()),
            })?;

        Ok((state, revision))
    }

    /// Build the draft for a new revision without touching the control plane
    ///
    /// An empty or absent container name targets the first container.
    pub fn apply(
        revision: &TaskDefinitionRevision,
        container_name: Option<&str>,
        image: &str,
    ) -> Result<TaskDefinitionDraft> {
        if revision.containers.is_empty() {
            return Err(Error::EmptyContainerSet {
                revision: revision.arn.clone(),
            });
        }

        let index = match container_name.filter(|name| !name.is_empty()) {
            Some(name) => revision
                .containers
                .iter()
                .position(|c| c.name == name)
                .ok_or_else(|| Error::ContainerNotFound {
                    container: name.to_string(),
                    revision: revision.arn.clone(),
                })?,
            None => 0,
        };

        let mut draft = revision.draft();
        draft.containers[index].image = image.to_string();
        Ok(draft)
    }

    /// Register a new revision of the service's active task definition
    pub async fn mutate(
        &self,
        cluster: &str,
        service: &str,
        container_name: Option<&str>,
        image: &str,
    ) -> Result<RegisteredRevision> {
        let (_, current) = self.resolve_active(cluster, service).await?;
        let draft = Self::apply(&current, container_name, image)?;

        let container = container_name
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| current.containers[0].name.clone());

        debug!(
            family = %draft.family,
            container = %container,
            image,
            "Registering task definition revision"
        );

        let arn = self.client.register_task_definition(&draft).await?;

        info!(
            previous = %current.arn,
            revision = %arn,
            container = %container,
            "Registered task definition revision"
        );

        Ok(RegisteredRevision {
            arn,
            previous: current.arn,
            container,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::revision;

    #[test]
    fn test_apply_changes_only_target_image() {
        let original = revision("web", 4);
        let draft = TaskDefinitionMutator::apply(&original, Some("sidecar"), "envoy:1.28").unwrap();

        let mut expected = original.draft();
        expected.containers[1].image = "envoy:1.28".to_string();
        assert_eq!(draft, expected);
        assert_eq!(draft.containers[0], original.containers[0]);
    }

    #[test]
    fn test_apply_defaults_to_first_container() {
        let original = revision("web", 4);

        for name in [None, Some("")] {
            let draft = TaskDefinitionMutator::apply(&original, name, "web:2.0").unwrap();
            assert_eq!(draft.containers[0].image, "web:2.0");
            assert_eq!(draft.containers[1], original.containers[1]);
            assert_eq!(draft.derived_from.as_deref(), Some(original.arn.as_str()));
        }
    }

    #[test]
    fn test_apply_rejects_unknown_container() {
        let err = TaskDefinitionMutator::apply(&revision("web", 1), Some("Web"), "x").unwrap_err();
        assert!(matches!(err, Error::ContainerNotFound { container, .. } if container == "Web"));
    }

    #[test]
    fn test_apply_rejects_empty_revision() {
        let mut empty = revision("web", 1);
        empty.containers.clear();
        let err = TaskDefinitionMutator::apply(&empty, None, "x").unwrap_err();
        assert!(matches!(err, Error::EmptyContainerSet { .. }));
    }
}
