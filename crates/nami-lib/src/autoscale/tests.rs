use super::*;
use crate::error::{Error, ErrorKind};
use crate::models::{ScalableTarget, ScalingMetric, TargetGroup};
use crate::testing::{steady_service, with_target_group, Call, FakeControlPlane};
use std::sync::Arc;

const LB_ARN: &str = "arn:aws:elasticloadbalancing:us-east-1:123:loadbalancer/app/my-lb/abc123";
const TG_ARN: &str = "arn:aws:elasticloadbalancing:us-east-1:123:targetgroup/my-tg/def456";

fn request(cpu: u32, memory: u32, requests: u32) -> ScalingRequest {
    ScalingRequest {
        cluster: "prod".to_string(),
        service: "api".to_string(),
        min_capacity: 1,
        max_capacity: 4,
        cpu_target: cpu,
        memory_target: memory,
        request_target: requests,
    }
}

fn balanced() -> Arc<FakeControlPlane> {
    let fake = Arc::new(FakeControlPlane::new());
    fake.add_service(with_target_group(steady_service("prod", "api", "web", 1), TG_ARN));
    fake.add_target_group(TargetGroup {
        arn: TG_ARN.to_string(),
        load_balancer_arns: vec![LB_ARN.to_string()],
    });
    fake
}

fn put_policies(fake: &FakeControlPlane) -> Vec<String> {
    fake.calls()
        .into_iter()
        .filter_map(|call| match call {
            Call::PutScalingPolicy { policy, .. } => Some(policy.name),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_memory_only_registers_one_policy() {
    let fake = balanced();

    let outcome = ScalingPolicyRegistrar::new(fake.clone())
        .register(&request(0, 40, 0))
        .await
        .unwrap();

    let calls = fake.calls();
    assert_eq!(
        calls[0],
        Call::RegisterScalableTarget(ScalableTarget {
            resource_id: "service/prod/api".to_string(),
            min_capacity: 1,
            max_capacity: 4,
        })
    );
    assert_eq!(put_policies(&fake), vec!["MemoryTrackingPolicy"]);
    assert_eq!(fake.count(|c| matches!(c, Call::DescribeServices { .. })), 0);
    assert_eq!(outcome.policies.len(), 1);
    assert_eq!(outcome.policies[0].metric, ScalingMetric::Memory);
    assert_eq!(outcome.policies[0].target_value, 40.0);
}

#[tokio::test]
async fn test_all_policies_in_order_with_resource_label() {
    let fake = balanced();

    let outcome = ScalingPolicyRegistrar::new(fake.clone())
        .register(&request(70, 80, 1000))
        .await
        .unwrap();

    assert_eq!(
        put_policies(&fake),
        vec!["CPUTrackingPolicy", "MemoryTrackingPolicy", "RequestTrackingPolicy"]
    );
    let request_policy = &outcome.policies[2];
    assert_eq!(
        request_policy.resource_label.as_deref(),
        Some("app/my-lb/abc123/targetgroup/my-tg/def456")
    );
    assert_eq!(request_policy.scale_in_cooldown_secs, 0);
    assert_eq!(request_policy.scale_out_cooldown_secs, 0);
}

#[tokio::test]
async fn test_min_above_max_is_rejected_before_any_call() {
    let fake = balanced();
    let mut req = request(70, 0, 0);
    req.min_capacity = 5;

    let err = ScalingPolicyRegistrar::new(fake.clone())
        .register(&req)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn test_target_registration_failure_aborts() {
    let fake = balanced();
    fake.fail_operation("register scalable target");

    let err = ScalingPolicyRegistrar::new(fake.clone())
        .register(&request(70, 80, 0))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(put_policies(&fake).is_empty());
}

#[tokio::test]
async fn test_policy_failure_stops_remaining_policies() {
    let fake = balanced();
    fake.fail_operation("put scaling policy");

    let err = ScalingPolicyRegistrar::new(fake.clone())
        .register(&request(70, 80, 1000))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Upstream { .. }));
    assert_eq!(put_policies(&fake), vec!["CPUTrackingPolicy"]);
    assert_eq!(fake.count(|c| matches!(c, Call::DescribeTargetGroup(_))), 0);
}

#[tokio::test]
async fn test_request_policy_without_load_balancer() {
    let fake = Arc::new(FakeControlPlane::new());
    fake.add_service(steady_service("prod", "api", "web", 1));

    let err = ScalingPolicyRegistrar::new(fake.clone())
        .register(&request(0, 0, 500))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::LoadBalancerNotFound { .. }));
    assert_eq!(fake.count(|c| matches!(c, Call::RegisterScalableTarget(_))), 1);
}

#[tokio::test]
async fn test_request_policy_with_unknown_target_group() {
    let fake = Arc::new(FakeControlPlane::new());
    fake.add_service(with_target_group(steady_service("prod", "api", "web", 1), TG_ARN));

    let err = ScalingPolicyRegistrar::new(fake.clone())
        .register(&request(0, 0, 500))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::TargetGroupNotFound { .. }));
}

#[tokio::test]
async fn test_malformed_load_balancer_arn() {
    let fake = Arc::new(FakeControlPlane::new());
    fake.add_service(with_target_group(steady_service("prod", "api", "web", 1), TG_ARN));
    fake.add_target_group(TargetGroup {
        arn: TG_ARN.to_string(),
        load_balancer_arns: vec!["arn:aws:elasticloadbalancing:us-east-1:123:loadbalancer/app/my-lb".to_string()],
    });

    let err = ScalingPolicyRegistrar::new(fake.clone())
        .register(&request(0, 0, 500))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LabelExtraction);
    assert!(put_policies(&fake).is_empty());
}
