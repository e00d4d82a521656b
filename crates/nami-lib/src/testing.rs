//! In-memory control plane used by the library's tests
//!
//! Records every call, replays scripted service snapshots (the last one
//! sticks), and injects failures per operation or per service.

use crate::arn::{self, TaskDefinitionRef};
use crate::client::ControlPlane;
use crate::error::{Error, Result};
use crate::models::{
    ContainerSpec, DescribeFailure, Deployment, DeploymentStatus, LoadBalancerBinding,
    MetricQuery, Page, ScalableTarget, ScalingPolicy, ServiceBatch, ServiceState, ServiceUpdate,
    TargetGroup, TaskDefinitionDraft, TaskDefinitionRevision, UtilizationMetric,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "us-east-1";

pub fn cluster_arn(cluster: &str) -> String {
    format!("arn:aws:ecs:{REGION}:{ACCOUNT}:cluster/{cluster}")
}

pub fn service_arn(cluster: &str, service: &str) -> String {
    format!("arn:aws:ecs:{REGION}:{ACCOUNT}:service/{cluster}/{service}")
}

pub fn task_definition_arn(family: &str, revision: u32) -> String {
    format!("arn:aws:ecs:{REGION}:{ACCOUNT}:task-definition/{family}:{revision}")
}

/// A recorded control-plane call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    DescribeServices { cluster: String, services: Vec<String> },
    DescribeTaskDefinition(String),
    RegisterTaskDefinition(TaskDefinitionDraft),
    UpdateService(ServiceUpdate),
    ListServices { cluster: String, next_token: Option<String> },
    ListClusters,
    ListTaskDefinitions(String),
    RegisterScalableTarget(ScalableTarget),
    DescribeScalableTargets(String),
    PutScalingPolicy { resource_id: String, policy: ScalingPolicy },
    DescribeScalingPolicies(String),
    DescribeTargetGroup(String),
    MetricAverage(MetricQuery),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<Call>,
    clusters: Vec<String>,
    /// cluster name -> service names in listing order
    listings: HashMap<String, Vec<String>>,
    /// (cluster, service) -> snapshots still to be served
    snapshots: HashMap<(String, String), VecDeque<ServiceState>>,
    task_definitions: Vec<TaskDefinitionRevision>,
    scalable_targets: HashMap<String, ScalableTarget>,
    policies: HashMap<String, Vec<ScalingPolicy>>,
    target_groups: HashMap<String, TargetGroup>,
    metrics: HashMap<(String, UtilizationMetric), f64>,
    failing_operations: HashSet<String>,
    missing_services: HashSet<String>,
    failing_batches: HashSet<String>,
    failing_metrics: HashSet<String>,
    failing_listings: HashSet<String>,
}

/// Scripted [`ControlPlane`] for tests
pub struct FakeControlPlane {
    state: Mutex<FakeState>,
    page_size: usize,
    describe_delay: Option<Duration>,
}

impl Default for FakeControlPlane {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
            page_size: 100,
            describe_delay: None,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Answer describe calls only after a real delay
    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = Some(delay);
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Register a cluster and service with a single steady snapshot
    pub fn add_service(&self, snapshot: ServiceState) {
        let cluster = arn::cluster_name(&snapshot.cluster_arn).to_string();
        let service = snapshot.service_name.clone();
        let mut state = self.state();
        if !state.clusters.iter().any(|c| arn::cluster_name(c) == cluster) {
            state.clusters.push(cluster_arn(&cluster));
        }
        state
            .listings
            .entry(cluster.clone())
            .or_default()
            .push(service.clone());
        state
            .snapshots
            .insert((cluster, service), VecDeque::from([snapshot]));
    }

    pub fn add_cluster(&self, cluster: &str) {
        self.state().clusters.push(cluster_arn(cluster));
    }

    /// Replace the snapshots served for a service; the last one repeats
    pub fn script(&self, cluster: &str, service: &str, snapshots: Vec<ServiceState>) {
        self.state()
            .snapshots
            .insert((cluster.to_string(), service.to_string()), snapshots.into());
    }

    pub fn add_task_definition(&self, revision: TaskDefinitionRevision) {
        self.state().task_definitions.push(revision);
    }

    pub fn add_target_group(&self, group: TargetGroup) {
        self.state().target_groups.insert(group.arn.clone(), group);
    }

    pub fn add_scaling(&self, target: ScalableTarget, policies: Vec<ScalingPolicy>) {
        let mut state = self.state();
        state.policies.insert(target.resource_id.clone(), policies);
        state
            .scalable_targets
            .insert(target.resource_id.clone(), target);
    }

    pub fn set_metric(&self, service: &str, metric: UtilizationMetric, value: f64) {
        self.state().metrics.insert((service.to_string(), metric), value);
    }

    /// Make every call of the named operation fail
    pub fn fail_operation(&self, operation: &str) {
        self.state().failing_operations.insert(operation.to_string());
    }

    /// Report the service as a per-identifier describe failure
    pub fn mark_missing(&self, service: &str) {
        self.state().missing_services.insert(service.to_string());
    }

    /// Fail any describe batch that contains the service
    pub fn fail_batch_with(&self, service: &str) {
        self.state().failing_batches.insert(service.to_string());
    }

    pub fn fail_metrics_for(&self, service: &str) {
        self.state().failing_metrics.insert(service.to_string());
    }

    /// Fail service listing for one cluster only
    pub fn fail_listing(&self, cluster: &str) {
        self.state().failing_listings.insert(cluster.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|call| matches(call)).count()
    }

    pub fn registered_revisions(&self) -> Vec<TaskDefinitionRevision> {
        self.state().task_definitions.clone()
    }

    fn record(&self, call: Call, operation: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(call);
        if state.failing_operations.contains(operation) {
            return Err(Error::upstream(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn describe_services(&self, cluster: &str, services: &[String]) -> Result<ServiceBatch> {
        self.record(
            Call::DescribeServices {
                cluster: cluster.to_string(),
                services: services.to_vec(),
            },
            "describe services",
        )?;

        if let Some(delay) = self.describe_delay {
            tokio::time::sleep(delay).await;
        }

        let cluster = arn::cluster_name(cluster).to_string();
        let mut state = self.state();

        if let Some(bad) = services
            .iter()
            .find(|id| state.failing_batches.contains(arn::service_name(id)))
        {
            return Err(Error::upstream(
                "describe services",
                format!("batch containing {bad} rejected"),
            ));
        }

        let mut batch = ServiceBatch::default();
        for id in services {
            let name = arn::service_name(id).to_string();
            if state.missing_services.contains(&name) {
                batch.failures.push(DescribeFailure {
                    arn: service_arn(&cluster, &name),
                    reason: "MISSING".to_string(),
                    detail: None,
                });
                continue;
            }

            match state.snapshots.get_mut(&(cluster.clone(), name.clone())) {
                Some(queue) => {
                    let snapshot = if queue.len() > 1 {
                        queue.pop_front()
                    } else {
                        queue.front().cloned()
                    };
                    batch.services.extend(snapshot);
                }
                None => batch.failures.push(DescribeFailure {
                    arn: service_arn(&cluster, &name),
                    reason: "MISSING".to_string(),
                    detail: None,
                }),
            }
        }

        Ok(batch)
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<Option<TaskDefinitionRevision>> {
        self.record(
            Call::DescribeTaskDefinition(task_definition.to_string()),
            "describe task definition",
        )?;

        let wanted = TaskDefinitionRef::parse(task_definition);
        let state = self.state();
        Ok(state
            .task_definitions
            .iter()
            .find(|td| {
                td.arn == task_definition
                    || wanted.as_ref().is_some_and(|r| {
                        r.family == td.family && r.revision == Some(td.revision)
                    })
            })
            .cloned())
    }

    async fn register_task_definition(&self, draft: &TaskDefinitionDraft) -> Result<String> {
        self.record(
            Call::RegisterTaskDefinition(draft.clone()),
            "register task definition",
        )?;

        let mut state = self.state();
        let revision = state
            .task_definitions
            .iter()
            .filter(|td| td.family == draft.family)
            .map(|td| td.revision)
            .max()
            .unwrap_or(0)
            + 1;
        let arn = task_definition_arn(&draft.family, revision);

        state.task_definitions.push(TaskDefinitionRevision {
            arn: arn.clone(),
            family: draft.family.clone(),
            revision,
            containers: draft.containers.clone(),
            cpu: draft.cpu.clone(),
            memory: draft.memory.clone(),
            network_mode: draft.network_mode.clone(),
            task_role_arn: draft.task_role_arn.clone(),
            execution_role_arn: draft.execution_role_arn.clone(),
            requires_compatibilities: draft.requires_compatibilities.clone(),
            registered_at: None,
        });

        Ok(arn)
    }

    async fn update_service(&self, update: &ServiceUpdate) -> Result<()> {
        self.record(Call::UpdateService(update.clone()), "update service")
    }

    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> Result<Page> {
        self.record(
            Call::ListServices {
                cluster: cluster.to_string(),
                next_token: next_token.clone(),
            },
            "list services",
        )?;

        let cluster = arn::cluster_name(cluster);
        let state = self.state();
        if state.failing_listings.contains(cluster) {
            return Err(Error::upstream("list services", "access denied"));
        }
        let names = state.listings.get(cluster).cloned().unwrap_or_default();
        let start: usize = next_token.as_deref().and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(names.len());

        Ok(Page {
            items: names[start.min(end)..end]
                .iter()
                .map(|name| service_arn(cluster, name))
                .collect(),
            next_token: (end < names.len()).then(|| end.to_string()),
        })
    }

    async fn list_clusters(&self) -> Result<Vec<String>> {
        self.record(Call::ListClusters, "list clusters")?;
        Ok(self.state().clusters.clone())
    }

    async fn list_task_definitions(
        &self,
        family: &str,
        next_token: Option<String>,
    ) -> Result<Page> {
        self.record(
            Call::ListTaskDefinitions(family.to_string()),
            "list task definitions",
        )?;

        if next_token.is_some() {
            return Ok(Page::default());
        }

        let mut revisions: Vec<_> = self
            .state()
            .task_definitions
            .iter()
            .filter(|td| td.family == family)
            .map(|td| (td.revision, td.arn.clone()))
            .collect();
        revisions.sort();

        Ok(Page {
            items: revisions.into_iter().map(|(_, arn)| arn).collect(),
            next_token: None,
        })
    }

    async fn register_scalable_target(&self, target: &ScalableTarget) -> Result<()> {
        self.record(
            Call::RegisterScalableTarget(target.clone()),
            "register scalable target",
        )?;
        self.state()
            .scalable_targets
            .insert(target.resource_id.clone(), target.clone());
        Ok(())
    }

    async fn describe_scalable_targets(&self, resource_id: &str) -> Result<Vec<ScalableTarget>> {
        self.record(
            Call::DescribeScalableTargets(resource_id.to_string()),
            "describe scalable targets",
        )?;
        Ok(self
            .state()
            .scalable_targets
            .get(resource_id)
            .cloned()
            .into_iter()
            .collect())
    }

    async fn put_scaling_policy(&self, resource_id: &str, policy: &ScalingPolicy) -> Result<()> {
        self.record(
            Call::PutScalingPolicy {
                resource_id: resource_id.to_string(),
                policy: policy.clone(),
            },
            "put scaling policy",
        )?;

        let mut state = self.state();
        let policies = state.policies.entry(resource_id.to_string()).or_default();
        policies.retain(|p| p.name != policy.name);
        policies.push(policy.clone());
        Ok(())
    }

    async fn describe_scaling_policies(&self, resource_id: &str) -> Result<Vec<ScalingPolicy>> {
        self.record(
            Call::DescribeScalingPolicies(resource_id.to_string()),
            "describe scaling policies",
        )?;
        Ok(self
            .state()
            .policies
            .get(resource_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_target_group(&self, target_group_arn: &str) -> Result<Option<TargetGroup>> {
        self.record(
            Call::DescribeTargetGroup(target_group_arn.to_string()),
            "describe target groups",
        )?;
        Ok(self.state().target_groups.get(target_group_arn).cloned())
    }

    async fn metric_average(&self, query: &MetricQuery) -> Result<f64> {
        self.record(Call::MetricAverage(query.clone()), "get metric statistics")?;

        let service = arn::service_name(&query.service).to_string();
        let state = self.state();
        if state.failing_metrics.contains(&service) {
            return Err(Error::upstream("get metric statistics", "throttled"));
        }
        Ok(state
            .metrics
            .get(&(service, query.metric))
            .copied()
            .unwrap_or(0.0))
    }
}

/// A steady service on `family:revision` with every task running
pub fn steady_service(cluster: &str, service: &str, family: &str, revision: u32) -> ServiceState {
    let task_definition = task_definition_arn(family, revision);
    ServiceState {
        cluster_arn: cluster_arn(cluster),
        service_arn: service_arn(cluster, service),
        service_name: service.to_string(),
        status: "ACTIVE".to_string(),
        task_definition: Some(task_definition.clone()),
        desired_count: 2,
        running_count: 2,
        pending_count: 0,
        deployments: vec![deployment(&task_definition, DeploymentStatus::Primary)],
        launch_type: Some("FARGATE".to_string()),
        capacity_providers: vec![],
        circuit_breaker_enabled: false,
        load_balancers: vec![],
        created_at: None,
    }
}

pub fn deployment(task_definition: &str, status: DeploymentStatus) -> Deployment {
    Deployment {
        id: format!("ecs-svc/{}", arn::short_name(task_definition)),
        status,
        task_definition: task_definition.to_string(),
        desired_count: 2,
        running_count: 2,
        rollout_state: None,
    }
}

pub fn with_target_group(mut service: ServiceState, target_group_arn: &str) -> ServiceState {
    service.load_balancers.push(LoadBalancerBinding {
        target_group_arn: Some(target_group_arn.to_string()),
        container_name: Some("web".to_string()),
        container_port: Some(8080),
    });
    service
}

/// A two-container revision with distinct images and log settings
pub fn revision(family: &str, revision: u32) -> TaskDefinitionRevision {
    TaskDefinitionRevision {
        arn: task_definition_arn(family, revision),
        family: family.to_string(),
        revision,
        containers: vec![
            ContainerSpec {
                name: "web".to_string(),
                image: "registry.example.com/web:1.0".to_string(),
                log_configuration: Some(crate::models::LogConfiguration {
                    driver: "awslogs".to_string(),
                    group: Some(format!("/ecs/{family}")),
                    stream_prefix: Some("web".to_string()),
                }),
            },
            ContainerSpec {
                name: "sidecar".to_string(),
                image: "registry.example.com/envoy:1.27".to_string(),
                log_configuration: None,
            },
        ],
        cpu: Some("512".to_string()),
        memory: Some("1024".to_string()),
        network_mode: Some("awsvpc".to_string()),
        task_role_arn: Some(format!("arn:aws:iam::{ACCOUNT}:role/{family}-task")),
        execution_role_arn: Some(format!("arn:aws:iam::{ACCOUNT}:role/ecsTaskExecutionRole")),
        requires_compatibilities: vec!["FARGATE".to_string()],
        registered_at: None,
    }
}
