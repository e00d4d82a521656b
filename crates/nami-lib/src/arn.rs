//! Resource name and ARN parsing
//!
//! All identifier decomposition lives here: short names, task definition
//! references, and the load balancer / target group pieces needed to build
//! a request-count scaling resource label.

use crate::error::{Error, Result};
use std::fmt;

/// A parsed Amazon Resource Name
///
/// `arn:<partition>:<service>:<region>:<account>:<resource>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn<'a> {
    pub partition: &'a str,
    pub service: &'a str,
    pub region: &'a str,
    pub account: &'a str,
    pub resource: &'a str,
}

impl<'a> Arn<'a> {
    /// Parse an ARN, returning `None` if it does not have six colon-separated parts
    pub fn parse(input: &'a str) -> Option<Self> {
        let mut parts = input.splitn(6, ':');
        if parts.next()? != "arn" {
            return None;
        }
        let partition = parts.next()?;
        let service = parts.next()?;
        let region = parts.next()?;
        let account = parts.next()?;
        let resource = parts.next()?;

        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return None;
        }

        Some(Self {
            partition,
            service,
            region,
            account,
            resource,
        })
    }

    /// Resource type prefix (`service`, `cluster`, `loadbalancer`, ...)
    pub fn resource_type(&self) -> &'a str {
        self.resource
            .split_once('/')
            .map(|(kind, _)| kind)
            .unwrap_or(self.resource)
    }

    /// Path segments after the resource type
    pub fn resource_path(&self) -> impl Iterator<Item = &'a str> {
        self.resource.split('/').skip(1)
    }
}

/// Last `/`-separated segment of an identifier
///
/// Works for both ARNs and plain names, so callers can pass either.
pub fn short_name(identifier: &str) -> &str {
    identifier.rsplit('/').next().unwrap_or(identifier)
}

/// Cluster name from a cluster ARN, service ARN in the long format, or plain name
pub fn cluster_name(identifier: &str) -> &str {
    match Arn::parse(identifier) {
        Some(arn) if arn.resource_type() == "service" => {
            let path: Vec<&str> = arn.resource_path().collect();
            if path.len() == 2 {
                path[0]
            } else {
                short_name(identifier)
            }
        }
        _ => short_name(identifier),
    }
}

/// Service name from a service ARN (short or long format) or plain name
pub fn service_name(identifier: &str) -> &str {
    short_name(identifier)
}

/// Application autoscaling resource id for a service
pub fn scaling_resource_id(cluster: &str, service: &str) -> String {
    format!("service/{}/{}", cluster_name(cluster), service_name(service))
}

/// A `family:revision` task definition reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinitionRef {
    pub family: String,
    pub revision: Option<u32>,
}

impl TaskDefinitionRef {
    /// Parse a task definition ARN, `family:revision`, or bare family name
    pub fn parse(identifier: &str) -> Option<Self> {
        let name = short_name(identifier);
        if name.is_empty() {
            return None;
        }

        match name.rsplit_once(':') {
            Some((family, revision)) => {
                let revision = revision.parse().ok()?;
                if family.is_empty() {
                    return None;
                }
                Some(Self {
                    family: family.to_string(),
                    revision: Some(revision),
                })
            }
            None => Some(Self {
                family: name.to_string(),
                revision: None,
            }),
        }
    }

    pub fn with_revision(family: impl Into<String>, revision: u32) -> Self {
        Self {
            family: family.into(),
            revision: Some(revision),
        }
    }
}

impl fmt::Display for TaskDefinitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(revision) => write!(f, "{}:{}", self.family, revision),
            None => write!(f, "{}", self.family),
        }
    }
}

/// `loadbalancer/<type>/<name>/<id>` from a load balancer ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerId {
    pub kind: String,
    pub name: String,
    pub id: String,
}

impl LoadBalancerId {
    pub fn from_arn(arn: &str) -> Result<Self> {
        let [kind, name, id] = elb_resource(arn, "loadbalancer")?;
        Ok(Self { kind, name, id })
    }
}

impl fmt::Display for LoadBalancerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.name, self.id)
    }
}

/// `targetgroup/<name>/<id>` from a target group ARN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupId {
    pub name: String,
    pub id: String,
}

impl TargetGroupId {
    pub fn from_arn(arn: &str) -> Result<Self> {
        let [name, id] = elb_resource(arn, "targetgroup")?;
        Ok(Self { name, id })
    }
}

impl fmt::Display for TargetGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "targetgroup/{}/{}", self.name, self.id)
    }
}

/// Build the `ALBRequestCountPerTarget` resource label
///
/// `<lb-type>/<lb-name>/<lb-id>/targetgroup/<tg-name>/<tg-id>`
pub fn resource_label(load_balancer_arn: &str, target_group_arn: &str) -> Result<String> {
    let load_balancer = LoadBalancerId::from_arn(load_balancer_arn)?;
    let target_group = TargetGroupId::from_arn(target_group_arn)?;
    Ok(format!("{load_balancer}/{target_group}"))
}

/// Split an elasticloadbalancing ARN into exactly `N` non-empty path segments
fn elb_resource<const N: usize>(input: &str, expected_type: &str) -> Result<[String; N]> {
    let fail = |reason: String| Error::LabelExtractionFailed {
        arn: input.to_string(),
        reason,
    };

    let arn = Arn::parse(input).ok_or_else(|| fail("not an ARN".to_string()))?;

    if !arn.partition.starts_with("aws") {
        return Err(fail(format!("unexpected partition {:?}", arn.partition)));
    }
    if arn.service != "elasticloadbalancing" {
        return Err(fail(format!(
            "expected an elasticloadbalancing ARN, got service {:?}",
            arn.service
        )));
    }
    if arn.region.is_empty() {
        return Err(fail("missing region".to_string()));
    }
    if arn.account.is_empty() || !arn.account.bytes().all(|b| b.is_ascii_digit()) {
        return Err(fail(format!("invalid account id {:?}", arn.account)));
    }
    if arn.resource_type() != expected_type {
        return Err(fail(format!(
            "expected resource type {expected_type:?}, got {:?}",
            arn.resource_type()
        )));
    }

    let segments: Vec<&str> = arn.resource_path().collect();
    if segments.len() != N || segments.iter().any(|s| s.is_empty()) {
        return Err(fail(format!(
            "expected {N} path segments after {expected_type:?}, got {}",
            segments.len()
        )));
    }

    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, segment) in out.iter_mut().zip(segments) {
        *slot = segment.to_string();
    }
    Ok(out)
}
