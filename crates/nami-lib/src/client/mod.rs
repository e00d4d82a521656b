//! Orchestration control-plane client facade
//!
//! Components never talk to the cloud APIs directly. They receive one
//! `Arc<dyn ControlPlane>` built at process start, which keeps every
//! orchestration path testable against an in-memory fake.

mod aws;

pub use aws::{AwsControlPlane, AwsOptions};

use crate::error::Result;
use crate::models::{
    MetricQuery, Page, ScalableTarget, ScalingPolicy, ServiceBatch, ServiceState,
    ServiceUpdate, TargetGroup, TaskDefinitionDraft, TaskDefinitionRevision,
};
use async_trait::async_trait;

/// Largest identifier batch accepted by a describe-services call
pub const DESCRIBE_BATCH_SIZE: usize = 10;

/// Capability interface over the control plane and metrics collaborators
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Describe up to [`DESCRIBE_BATCH_SIZE`] services in one cluster
    async fn describe_services(&self, cluster: &str, services: &[String]) -> Result<ServiceBatch>;

    /// Resolve a task definition by ARN or `family:revision`
    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<Option<TaskDefinitionRevision>>;

    /// Register a new immutable revision, returning its ARN
    async fn register_task_definition(&self, draft: &TaskDefinitionDraft) -> Result<String>;

    async fn update_service(&self, update: &ServiceUpdate) -> Result<()>;

    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> Result<Page>;

    async fn list_clusters(&self) -> Result<Vec<String>>;

    /// Active revision ARNs of a task definition family, oldest first
    async fn list_task_definitions(
        &self,
        family: &str,
        next_token: Option<String>,
    ) -> Result<Page>;

    async fn register_scalable_target(&self, target: &ScalableTarget) -> Result<()>;

    async fn describe_scalable_targets(&self, resource_id: &str) -> Result<Vec<ScalableTarget>>;

    async fn put_scaling_policy(&self, resource_id: &str, policy: &ScalingPolicy) -> Result<()>;

    async fn describe_scaling_policies(&self, resource_id: &str) -> Result<Vec<ScalingPolicy>>;

    async fn describe_target_group(&self, target_group_arn: &str) -> Result<Option<TargetGroup>>;

    /// Average of a service metric over the query window
    async fn metric_average(&self, query: &MetricQuery) -> Result<f64>;

    /// Describe a single service, `None` if the control plane has no record of it
    async fn describe_service(&self, cluster: &str, service: &str) -> Result<Option<ServiceState>> {
        let batch = self
            .describe_services(cluster, &[service.to_string()])
            .await?;
        Ok(batch.services.into_iter().next())
    }
}

/// Drain every page of a paginated list call
pub async fn collect_pages<F, Fut>(mut fetch: F) -> Result<Vec<String>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: std::future::Future<Output = Result<Page>>,
{
    let mut items = Vec::new();
    let mut next_token = None;

    loop {
        let page = fetch(next_token).await?;
        items.extend(page.items);

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    Ok(items)
}
