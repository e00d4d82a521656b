//! AWS-backed control plane
//!
//! Wraps the ECS, CloudWatch, Application Auto Scaling and ELBv2 SDK
//! clients behind [`ControlPlane`]. One instance is built per process.

use super::{collect_pages, ControlPlane};
use crate::arn;
use crate::error::{Error, Result};
use crate::models::{
    ContainerSpec, DescribeFailure, Deployment, DeploymentStatus, LoadBalancerBinding,
    LogConfiguration, MetricQuery, Page, ScalableTarget, ScalingMetric, ScalingPolicy,
    ServiceBatch, ServiceState, ServiceUpdate, TargetGroup, TaskDefinitionDraft,
    TaskDefinitionRevision,
};
use async_trait::async_trait;
use aws_sdk_applicationautoscaling::types::{
    MetricType, PolicyType, PredefinedMetricSpecification, ScalableDimension, ServiceNamespace,
    TargetTrackingScalingPolicyConfiguration,
};
use aws_sdk_cloudwatch::types::{Dimension, Statistic};
use aws_sdk_ecs::error::DisplayErrorContext;
use aws_sdk_ecs::primitives::DateTime as SdkDateTime;
use aws_sdk_ecs::types as ecs;
use chrono::{DateTime, Utc};
use tracing::debug;

const LOG_GROUP_OPTION: &str = "awslogs-group";
const LOG_STREAM_PREFIX_OPTION: &str = "awslogs-stream-prefix";
const LIST_PAGE_SIZE: i32 = 100;

/// Region and credential profile overrides
#[derive(Debug, Clone, Default)]
pub struct AwsOptions {
    pub region: Option<String>,
    pub profile: Option<String>,
}

/// Control plane backed by the AWS SDK
pub struct AwsControlPlane {
    ecs: aws_sdk_ecs::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
    autoscaling: aws_sdk_applicationautoscaling::Client,
    elb: aws_sdk_elasticloadbalancingv2::Client,
}

impl AwsControlPlane {
    /// Resolve credentials and region from the environment, applying overrides
    pub async fn connect(options: AwsOptions) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = options.region {
            loader = loader.region(aws_config::Region::new(region));
        }

        if let Some(profile) = options.profile {
            loader = loader.profile_name(profile);
        }

        let config = loader.load().await;
        debug!(region = ?config.region(), "Loaded AWS configuration");
        Self::from_config(&config)
    }

    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self {
            ecs: aws_sdk_ecs::Client::new(config),
            cloudwatch: aws_sdk_cloudwatch::Client::new(config),
            autoscaling: aws_sdk_applicationautoscaling::Client::new(config),
            elb: aws_sdk_elasticloadbalancingv2::Client::new(config),
        }
    }

    async fn describe_raw_task_definition(&self, task_definition: &str) -> Result<Option<ecs::TaskDefinition>> {
        let output = self
            .ecs
            .describe_task_definition()
            .task_definition(task_definition)
            .send()
            .await
            .map_err(upstream("describe task definition"))?;

        Ok(output.task_definition().cloned())
    }
}

#[async_trait]
impl ControlPlane for AwsControlPlane {
    async fn describe_services(&self, cluster: &str, services: &[String]) -> Result<ServiceBatch> {
        let output = self
            .ecs
            .describe_services()
            .cluster(cluster)
            .set_services(Some(services.to_vec()))
            .send()
            .await
            .map_err(upstream("describe services"))?;

        let failures = output
            .failures()
            .iter()
            .map(|failure| DescribeFailure {
                arn: failure.arn().unwrap_or_default().to_string(),
                reason: failure.reason().unwrap_or("UNKNOWN").to_string(),
                detail: failure.detail().map(str::to_string),
            })
            .collect();

        Ok(ServiceBatch {
            services: output.services().iter().map(service_state).collect(),
            failures,
        })
    }

    async fn describe_task_definition(
        &self,
        task_definition: &str,
    ) -> Result<Option<TaskDefinitionRevision>> {
        Ok(self
            .describe_raw_task_definition(task_definition)
            .await?
            .as_ref()
            .map(revision_model))
    }

    async fn register_task_definition(&self, draft: &TaskDefinitionDraft) -> Result<String> {
        // Re-read the source so fields outside the draft survive unchanged
        let source = match &draft.derived_from {
            Some(arn) => Some(self.describe_raw_task_definition(arn).await?.ok_or_else(|| {
                Error::MissingTaskDefinition {
                    service: draft.family.clone(),
                    revision: Some(arn.clone()),
                }
            })?),
            None => None,
        };

        let containers = draft
            .containers
            .iter()
            .map(|spec| {
                let original = source.as_ref().and_then(|td| {
                    td.container_definitions()
                        .iter()
                        .find(|c| c.name() == Some(spec.name.as_str()))
                });
                match original {
                    Some(definition) => {
                        let mut definition = definition.clone();
                        definition.image = Some(spec.image.clone());
                        Ok(definition)
                    }
                    None => container_definition(spec),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let mut request = self
            .ecs
            .register_task_definition()
            .family(&draft.family)
            .set_container_definitions(Some(containers))
            .set_cpu(draft.cpu.clone())
            .set_memory(draft.memory.clone())
            .set_task_role_arn(draft.task_role_arn.clone())
            .set_execution_role_arn(draft.execution_role_arn.clone())
            .set_network_mode(draft.network_mode.as_deref().map(ecs::NetworkMode::from));

        if !draft.requires_compatibilities.is_empty() {
            request = request.set_requires_compatibilities(Some(
                draft
                    .requires_compatibilities
                    .iter()
                    .map(|c| ecs::Compatibility::from(c.as_str()))
                    .collect(),
            ));
        }

        if let Some(td) = source {
            request = request
                .set_volumes(td.volumes)
                .set_placement_constraints(td.placement_constraints)
                .set_ephemeral_storage(td.ephemeral_storage)
                .set_proxy_configuration(td.proxy_configuration)
                .set_inference_accelerators(td.inference_accelerators)
                .set_runtime_platform(td.runtime_platform)
                .set_ipc_mode(td.ipc_mode)
                .set_pid_mode(td.pid_mode);
        }

        let output = request
            .send()
            .await
            .map_err(upstream("register task definition"))?;

        output
            .task_definition()
            .and_then(|td| td.task_definition_arn())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::upstream(
                    "register task definition",
                    "response carried no task definition ARN",
                )
            })
    }

    async fn update_service(&self, update: &ServiceUpdate) -> Result<()> {
        self.ecs
            .update_service()
            .cluster(&update.cluster)
            .service(&update.service)
            .set_task_definition(update.task_definition.clone())
            .force_new_deployment(update.force_new_deployment)
            .send()
            .await
            .map_err(upstream("update service"))?;

        Ok(())
    }

    async fn list_services(&self, cluster: &str, next_token: Option<String>) -> Result<Page> {
        let output = self
            .ecs
            .list_services()
            .cluster(cluster)
            .max_results(LIST_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(upstream("list services"))?;

        Ok(Page {
            items: output.service_arns().to_vec(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn list_clusters(&self) -> Result<Vec<String>> {
        collect_pages(|next_token| async move {
            let output = self
                .ecs
                .list_clusters()
                .max_results(LIST_PAGE_SIZE)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(upstream("list clusters"))?;

            Ok(Page {
                items: output.cluster_arns().to_vec(),
                next_token: output.next_token().map(str::to_string),
            })
        })
        .await
    }

    async fn list_task_definitions(
        &self,
        family: &str,
        next_token: Option<String>,
    ) -> Result<Page> {
        let output = self
            .ecs
            .list_task_definitions()
            .family_prefix(family)
            .status(ecs::TaskDefinitionStatus::Active)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(upstream("list task definitions"))?;

        Ok(Page {
            items: output.task_definition_arns().to_vec(),
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn register_scalable_target(&self, target: &ScalableTarget) -> Result<()> {
        self.autoscaling
            .register_scalable_target()
            .service_namespace(ecs_namespace())
            .resource_id(&target.resource_id)
            .scalable_dimension(desired_count_dimension())
            .min_capacity(target.min_capacity)
            .max_capacity(target.max_capacity)
            .send()
            .await
            .map_err(upstream("register scalable target"))?;

        Ok(())
    }

    async fn describe_scalable_targets(&self, resource_id: &str) -> Result<Vec<ScalableTarget>> {
        let output = self
            .autoscaling
            .describe_scalable_targets()
            .service_namespace(ecs_namespace())
            .resource_ids(resource_id)
            .scalable_dimension(desired_count_dimension())
            .send()
            .await
            .map_err(upstream("describe scalable targets"))?;

        Ok(output
            .scalable_targets()
            .iter()
            .map(|target| {
                // Required members are plain values in newer SDK releases
                let resource_id: Option<String> = target.resource_id.clone().into();
                let min_capacity: Option<i32> = target.min_capacity.into();
                let max_capacity: Option<i32> = target.max_capacity.into();
                ScalableTarget {
                    resource_id: resource_id.unwrap_or_default(),
                    min_capacity: min_capacity.unwrap_or_default(),
                    max_capacity: max_capacity.unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn put_scaling_policy(&self, resource_id: &str, policy: &ScalingPolicy) -> Result<()> {
        let metric = PredefinedMetricSpecification::builder()
            .predefined_metric_type(MetricType::from(policy.metric.predefined_metric_type()))
            .set_resource_label(policy.resource_label.clone())
            .build()
            .map_err(upstream("build predefined metric specification"))?;

        let configuration = TargetTrackingScalingPolicyConfiguration::builder()
            .target_value(policy.target_value)
            .predefined_metric_specification(metric)
            .scale_in_cooldown(policy.scale_in_cooldown_secs)
            .scale_out_cooldown(policy.scale_out_cooldown_secs)
            .build()
            .map_err(upstream("build target tracking configuration"))?;

        self.autoscaling
            .put_scaling_policy()
            .policy_name(&policy.name)
            .policy_type(PolicyType::from("TargetTrackingScaling"))
            .resource_id(resource_id)
            .scalable_dimension(desired_count_dimension())
            .service_namespace(ecs_namespace())
            .target_tracking_scaling_policy_configuration(configuration)
            .send()
            .await
            .map_err(upstream("put scaling policy"))?;

        Ok(())
    }

    async fn describe_scaling_policies(&self, resource_id: &str) -> Result<Vec<ScalingPolicy>> {
        let output = self
            .autoscaling
            .describe_scaling_policies()
            .service_namespace(ecs_namespace())
            .resource_id(resource_id)
            .scalable_dimension(desired_count_dimension())
            .send()
            .await
            .map_err(upstream("describe scaling policies"))?;

        // Step-scaling and custom-metric policies have no predefined metric
        Ok(output
            .scaling_policies()
            .iter()
            .filter_map(|policy| {
                let configuration = policy.target_tracking_scaling_policy_configuration()?;
                let specification = configuration.predefined_metric_specification()?;
                let metric_type: Option<MetricType> =
                    specification.predefined_metric_type.clone().into();
                let metric = ScalingMetric::from_predefined_metric_type(metric_type?.as_str())?;
                let name: Option<String> = policy.policy_name.clone().into();
                let target_value: Option<f64> = configuration.target_value.into();

                Some(ScalingPolicy {
                    name: name.unwrap_or_default(),
                    metric,
                    target_value: target_value.unwrap_or_default(),
                    resource_label: specification.resource_label().map(str::to_string),
                    scale_in_cooldown_secs: configuration.scale_in_cooldown().unwrap_or_default(),
                    scale_out_cooldown_secs: configuration.scale_out_cooldown().unwrap_or_default(),
                })
            })
            .collect())
    }

    async fn describe_target_group(&self, target_group_arn: &str) -> Result<Option<TargetGroup>> {
        let output = self
            .elb
            .describe_target_groups()
            .target_group_arns(target_group_arn)
            .send()
            .await
            .map_err(upstream("describe target groups"))?;

        Ok(output.target_groups().first().map(|group| TargetGroup {
            arn: group
                .target_group_arn()
                .unwrap_or(target_group_arn)
                .to_string(),
            load_balancer_arns: group.load_balancer_arns().to_vec(),
        }))
    }

    async fn metric_average(&self, query: &MetricQuery) -> Result<f64> {
        let end = Utc::now().timestamp();
        let start = end - i64::try_from(query.window.as_secs()).unwrap_or(i64::MAX / 2);
        let period = i32::try_from(query.period.as_secs()).unwrap_or(300);

        let output = self
            .cloudwatch
            .get_metric_statistics()
            .namespace("AWS/ECS")
            .metric_name(query.metric.metric_name())
            .dimensions(
                Dimension::builder()
                    .name("ClusterName")
                    .value(arn::cluster_name(&query.cluster))
                    .build(),
            )
            .dimensions(
                Dimension::builder()
                    .name("ServiceName")
                    .value(arn::service_name(&query.service))
                    .build(),
            )
            .start_time(SdkDateTime::from_secs(start))
            .end_time(SdkDateTime::from_secs(end))
            .period(period)
            .statistics(Statistic::Average)
            .send()
            .await
            .map_err(upstream("get metric statistics"))?;

        let averages: Vec<f64> = output
            .datapoints()
            .iter()
            .filter_map(|point| point.average())
            .collect();

        if averages.is_empty() {
            return Ok(0.0);
        }

        Ok(averages.iter().sum::<f64>() / averages.len() as f64)
    }
}

fn upstream<E>(operation: &'static str) -> impl FnOnce(E) -> Error
where
    E: std::error::Error + 'static,
{
    move |err| Error::upstream(operation, DisplayErrorContext(err).to_string())
}

fn ecs_namespace() -> ServiceNamespace {
    ServiceNamespace::from("ecs")
}

fn desired_count_dimension() -> ScalableDimension {
    ScalableDimension::from("ecs:service:DesiredCount")
}

fn timestamp(value: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

fn service_state(service: &ecs::Service) -> ServiceState {
    let deployments = service
        .deployments()
        .iter()
        .map(|deployment| Deployment {
            id: deployment.id().unwrap_or_default().to_string(),
            status: DeploymentStatus::from(deployment.status().unwrap_or_default()),
            task_definition: deployment.task_definition().unwrap_or_default().to_string(),
            desired_count: deployment.desired_count(),
            running_count: deployment.running_count(),
            rollout_state: deployment.rollout_state().map(|s| s.as_str().to_string()),
        })
        .collect();

    let capacity_providers = service
        .capacity_provider_strategy()
        .iter()
        .map(|item| {
            let name: Option<String> = item.capacity_provider.clone().into();
            name.unwrap_or_default()
        })
        .collect();

    let load_balancers = service
        .load_balancers()
        .iter()
        .map(|lb| LoadBalancerBinding {
            target_group_arn: lb.target_group_arn().map(str::to_string),
            container_name: lb.container_name().map(str::to_string),
            container_port: lb.container_port(),
        })
        .collect();

    ServiceState {
        cluster_arn: service.cluster_arn().unwrap_or_default().to_string(),
        service_arn: service.service_arn().unwrap_or_default().to_string(),
        service_name: service.service_name().unwrap_or_default().to_string(),
        status: service.status().unwrap_or_default().to_string(),
        task_definition: service.task_definition().map(str::to_string),
        desired_count: service.desired_count(),
        running_count: service.running_count(),
        pending_count: service.pending_count(),
        deployments,
        launch_type: service.launch_type().map(|l| l.as_str().to_string()),
        capacity_providers,
        circuit_breaker_enabled: service
            .deployment_configuration()
            .and_then(|c| c.deployment_circuit_breaker())
            .map(|breaker| breaker.enable())
            .unwrap_or(false),
        load_balancers,
        created_at: service.created_at().and_then(timestamp),
    }
}

fn revision_model(td: &ecs::TaskDefinition) -> TaskDefinitionRevision {
    TaskDefinitionRevision {
        arn: td.task_definition_arn().unwrap_or_default().to_string(),
        family: td.family().unwrap_or_default().to_string(),
        revision: u32::try_from(td.revision()).unwrap_or_default(),
        containers: td.container_definitions().iter().map(container_spec).collect(),
        cpu: td.cpu().map(str::to_string),
        memory: td.memory().map(str::to_string),
        network_mode: td.network_mode().map(|m| m.as_str().to_string()),
        task_role_arn: td.task_role_arn().map(str::to_string),
        execution_role_arn: td.execution_role_arn().map(str::to_string),
        requires_compatibilities: td
            .requires_compatibilities()
            .iter()
            .map(|c| c.as_str().to_string())
            .collect(),
        registered_at: td.registered_at().and_then(timestamp),
    }
}

fn container_spec(definition: &ecs::ContainerDefinition) -> ContainerSpec {
    let log_configuration = definition.log_configuration.as_ref().map(|config| {
        let driver: Option<ecs::LogDriver> = config.log_driver.clone().into();
        let option = |key: &str| {
            config
                .options
                .as_ref()
                .and_then(|options| options.get(key))
                .cloned()
        };
        LogConfiguration {
            driver: driver.map(|d| d.as_str().to_string()).unwrap_or_default(),
            group: option(LOG_GROUP_OPTION),
            stream_prefix: option(LOG_STREAM_PREFIX_OPTION),
        }
    });

    ContainerSpec {
        name: definition.name().unwrap_or_default().to_string(),
        image: definition.image().unwrap_or_default().to_string(),
        log_configuration,
    }
}

fn container_definition(spec: &ContainerSpec) -> Result<ecs::ContainerDefinition> {
    let log_configuration = match &spec.log_configuration {
        Some(config) => {
            let mut builder =
                ecs::LogConfiguration::builder().log_driver(ecs::LogDriver::from(config.driver.as_str()));
            if let Some(group) = &config.group {
                builder = builder.options(LOG_GROUP_OPTION, group);
            }
            if let Some(prefix) = &config.stream_prefix {
                builder = builder.options(LOG_STREAM_PREFIX_OPTION, prefix);
            }
            Some(builder.build().map_err(upstream("build log configuration"))?)
        }
        None => None,
    };

    Ok(ecs::ContainerDefinition::builder()
        .name(&spec.name)
        .image(&spec.image)
        .set_log_configuration(log_configuration)
        .build())
}
