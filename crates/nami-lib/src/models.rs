//! Core data models for the orchestration control plane

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable, registered task definition revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinitionRevision {
    pub arn: String,
    pub family: String,
    pub revision: u32,
    pub containers: Vec<ContainerSpec>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub network_mode: Option<String>,
    pub task_role_arn: Option<String>,
    pub execution_role_arn: Option<String>,
    pub requires_compatibilities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
}

impl TaskDefinitionRevision {
    /// Copy every registrable field into a draft for a new revision
    pub fn draft(&self) -> TaskDefinitionDraft {
        TaskDefinitionDraft {
            derived_from: Some(self.arn.clone()),
            family: self.family.clone(),
            containers: self.containers.clone(),
            cpu: self.cpu.clone(),
            memory: self.memory.clone(),
            network_mode: self.network_mode.clone(),
            task_role_arn: self.task_role_arn.clone(),
            execution_role_arn: self.execution_role_arn.clone(),
            requires_compatibilities: self.requires_compatibilities.clone(),
        }
    }
}

/// Fields submitted to register a new revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinitionDraft {
    /// ARN of the revision this draft was cloned from
    pub derived_from: Option<String>,
    pub family: String,
    pub containers: Vec<ContainerSpec>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub network_mode: Option<String>,
    pub task_role_arn: Option<String>,
    pub execution_role_arn: Option<String>,
    pub requires_compatibilities: Vec<String>,
}

/// One container within a task definition revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_configuration: Option<LogConfiguration>,
}

/// Container log routing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfiguration {
    pub driver: String,
    pub group: Option<String>,
    pub stream_prefix: Option<String>,
}

/// Snapshot of a service as reported by the control plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceState {
    pub cluster_arn: String,
    pub service_arn: String,
    pub service_name: String,
    pub status: String,
    pub task_definition: Option<String>,
    pub desired_count: i32,
    pub running_count: i32,
    pub pending_count: i32,
    pub deployments: Vec<Deployment>,
    pub launch_type: Option<String>,
    /// Capacity provider names in strategy order (may contain empty names)
    pub capacity_providers: Vec<String>,
    pub circuit_breaker_enabled: bool,
    pub load_balancers: Vec<LoadBalancerBinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ServiceState {
    /// Best-effort launch type for display
    ///
    /// Precedence: explicit launch type, first named capacity provider
    /// (or `CAPACITY_PROVIDER` when a strategy has no named entry), circuit
    /// breaker presence, then `UNKNOWN`.
    pub fn launch_label(&self) -> String {
        if let Some(launch_type) = self.launch_type.as_deref().filter(|l| !l.is_empty()) {
            return launch_type.to_string();
        }

        if !self.capacity_providers.is_empty() {
            return self
                .capacity_providers
                .iter()
                .find(|name| !name.is_empty())
                .cloned()
                .unwrap_or_else(|| "CAPACITY_PROVIDER".to_string());
        }

        if self.circuit_breaker_enabled {
            return "EC2/FARGATE".to_string();
        }

        "UNKNOWN".to_string()
    }

    pub fn first_target_group(&self) -> Option<&str> {
        self.load_balancers
            .iter()
            .find_map(|lb| lb.target_group_arn.as_deref())
    }
}

/// Load balancer attachment of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadBalancerBinding {
    pub target_group_arn: Option<String>,
    pub container_name: Option<String>,
    pub container_port: Option<i32>,
}

/// One rollout attempt of a service onto a revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: String,
    pub status: DeploymentStatus,
    pub task_definition: String,
    pub desired_count: i32,
    pub running_count: i32,
    pub rollout_state: Option<String>,
}

/// Deployment status as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Primary,
    Active,
    InProgress,
    Other(String),
}

impl From<&str> for DeploymentStatus {
    fn from(value: &str) -> Self {
        match value {
            "PRIMARY" => DeploymentStatus::Primary,
            "ACTIVE" => DeploymentStatus::Active,
            "IN_PROGRESS" => DeploymentStatus::InProgress,
            other => DeploymentStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeploymentStatus::Primary => write!(f, "PRIMARY"),
            DeploymentStatus::Active => write!(f, "ACTIVE"),
            DeploymentStatus::InProgress => write!(f, "IN_PROGRESS"),
            DeploymentStatus::Other(status) => write!(f, "{}", status),
        }
    }
}

/// Result of a batched describe call
#[derive(Debug, Clone, Default)]
pub struct ServiceBatch {
    pub services: Vec<ServiceState>,
    pub failures: Vec<DescribeFailure>,
}

/// Per-identifier failure reported by a batched describe call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeFailure {
    pub arn: String,
    pub reason: String,
    pub detail: Option<String>,
}

/// One page of identifiers from a list call
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<String>,
    pub next_token: Option<String>,
}

/// Request to repoint or redeploy a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUpdate {
    pub cluster: String,
    pub service: String,
    pub task_definition: Option<String>,
    pub force_new_deployment: bool,
}

/// Autoscaling-eligible service desired count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalableTarget {
    /// `service/<cluster>/<service>`
    pub resource_id: String,
    pub min_capacity: i32,
    pub max_capacity: i32,
}

/// Metric tracked by a target-tracking policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMetric {
    Cpu,
    Memory,
    RequestCountPerTarget,
}

impl ScalingMetric {
    pub fn predefined_metric_type(&self) -> &'static str {
        match self {
            ScalingMetric::Cpu => "ECSServiceAverageCPUUtilization",
            ScalingMetric::Memory => "ECSServiceAverageMemoryUtilization",
            ScalingMetric::RequestCountPerTarget => "ALBRequestCountPerTarget",
        }
    }

    pub fn from_predefined_metric_type(value: &str) -> Option<Self> {
        match value {
            "ECSServiceAverageCPUUtilization" => Some(ScalingMetric::Cpu),
            "ECSServiceAverageMemoryUtilization" => Some(ScalingMetric::Memory),
            "ALBRequestCountPerTarget" => Some(ScalingMetric::RequestCountPerTarget),
            _ => None,
        }
    }

    pub fn policy_name(&self) -> &'static str {
        match self {
            ScalingMetric::Cpu => "CPUTrackingPolicy",
            ScalingMetric::Memory => "MemoryTrackingPolicy",
            ScalingMetric::RequestCountPerTarget => "RequestTrackingPolicy",
        }
    }

    /// Short column label
    pub fn label(&self) -> &'static str {
        match self {
            ScalingMetric::Cpu => "CPU",
            ScalingMetric::Memory => "MEMORY",
            ScalingMetric::RequestCountPerTarget => "REQUESTS",
        }
    }
}

/// Target-tracking scaling policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub name: String,
    pub metric: ScalingMetric,
    pub target_value: f64,
    /// Required for request-count policies only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_label: Option<String>,
    pub scale_in_cooldown_secs: i32,
    pub scale_out_cooldown_secs: i32,
}

impl ScalingPolicy {
    /// Policy with the standard name for its metric and zero cooldowns
    pub fn target_tracking(metric: ScalingMetric, target_value: f64) -> Self {
        Self {
            name: metric.policy_name().to_string(),
            metric,
            target_value,
            resource_label: None,
            scale_in_cooldown_secs: 0,
            scale_out_cooldown_secs: 0,
        }
    }

    pub fn with_resource_label(mut self, label: impl Into<String>) -> Self {
        self.resource_label = Some(label.into());
        self
    }
}

/// Load balancer target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    pub arn: String,
    pub load_balancer_arns: Vec<String>,
}

/// Service-level utilization metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UtilizationMetric {
    Cpu,
    Memory,
}

impl UtilizationMetric {
    pub fn metric_name(&self) -> &'static str {
        match self {
            UtilizationMetric::Cpu => "CPUUtilization",
            UtilizationMetric::Memory => "MemoryUtilization",
        }
    }
}

/// Average of a service metric over a trailing window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricQuery {
    pub cluster: String,
    pub service: String,
    pub metric: UtilizationMetric,
    pub window: std::time::Duration,
    pub period: std::time::Duration,
}

impl MetricQuery {
    /// Trailing 24 hours at 5-minute granularity
    pub fn daily(cluster: &str, service: &str, metric: UtilizationMetric) -> Self {
        Self {
            cluster: cluster.to_string(),
            service: service.to_string(),
            metric,
            window: std::time::Duration::from_secs(24 * 60 * 60),
            period: std::time::Duration::from_secs(5 * 60),
        }
    }
}
