//! Revision history of a task definition family

use super::FleetAggregator;
use crate::arn::{self, TaskDefinitionRef};
use crate::client::collect_pages;
use crate::error::{Error, Result, Warning};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    /// `family:revision`
    pub revision: String,
    /// Images of every container, in definition order
    pub images: Vec<String>,
    pub registered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionReport {
    pub family: String,
    pub records: Vec<RevisionRecord>,
    pub warnings: Vec<Warning>,
}

impl FleetAggregator {
    /// Every active revision of a family, oldest first
    pub async fn revision_history(&self, family: &str) -> Result<RevisionReport> {
        let family = TaskDefinitionRef::parse(family)
            .map(|r| r.family)
            .ok_or_else(|| Error::validation("task definition family must not be empty"))?;

        let arns =
            collect_pages(|next_token| self.client.list_task_definitions(&family, next_token))
                .await?;

        let client = self.client.clone();
        let report = self
            .fanout()
            .run(arns, move |revision_arn: String| {
                let client = client.clone();
                async move {
                    let revision = client
                        .describe_task_definition(&revision_arn)
                        .await?
                        .ok_or_else(|| Error::MissingTaskDefinition {
                            service: arn::short_name(&revision_arn).to_string(),
                            revision: Some(revision_arn.clone()),
                        })?;

                    Ok::<_, Error>(RevisionRecord {
                        revision: format!("{}:{}", revision.family, revision.revision),
                        images: revision.containers.into_iter().map(|c| c.image).collect(),
                        registered_at: revision.registered_at,
                    })
                }
            })
            .await?;

        Ok(RevisionReport {
            family,
            records: report.results,
            warnings: report.warnings,
        })
    }
}
