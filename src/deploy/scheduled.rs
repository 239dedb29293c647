// ABOUTME: Scheduled task updates: repoint every target of a rule at a task definition.
// ABOUTME: Targets are put one at a time; rejected entries are collected, not retried.

use std::sync::Arc;

use nonempty::NonEmpty;

use crate::api::{
    DescribeRuleRequest, EcsApi, EventsApi, FailedEntry, ListTargetsByRuleRequest,
    PutTargetsRequest, Target,
};
use crate::types::TaskDefinitionArn;

use super::error::DeployError;
use super::task_definition::{TaskDefinitionManager, arn_of};

/// Outcome of a fully successful scheduled update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateSummary {
    pub rule: String,
    pub task_definition: TaskDefinitionArn,
    /// Ids of the updated targets, in rule order.
    pub updated: Vec<String>,
}

/// Rewrites the ECS parameters of a rule's targets.
pub struct ScheduledTargetUpdater {
    events: Arc<dyn EventsApi>,
    task_definitions: TaskDefinitionManager,
}

impl ScheduledTargetUpdater {
    pub fn new(events: Arc<dyn EventsApi>, ecs: Arc<dyn EcsApi>) -> Self {
        Self {
            events,
            task_definitions: TaskDefinitionManager::new(ecs),
        }
    }

    /// Point every target of `rule` at `task_definition` with `count` tasks.
    ///
    /// Every target is attempted. Targets the control plane rejects are logged
    /// and reported together as `PartialUpdateFailure`; targets updated before or
    /// after a rejection stay updated.
    pub async fn update(
        &self,
        rule: &str,
        task_definition: &str,
        count: i64,
    ) -> Result<UpdateSummary, DeployError> {
        let rule = self
            .events
            .describe_rule(&DescribeRuleRequest {
                name: rule.to_string(),
            })
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    DeployError::RuleNotFound(rule.to_string())
                } else {
                    DeployError::DescribeRule(e)
                }
            })?;

        let definition = self.task_definitions.describe(task_definition).await?;
        let arn = arn_of(&definition, "DescribeTaskDefinition").map_err(|source| {
            DeployError::DescribeTaskDefinition {
                reference: task_definition.to_string(),
                source,
            }
        })?;

        let targets = self.list_targets(&rule.name).await?;
        tracing::info!(rule = %rule.name, targets = targets.len(), "updating scheduled targets");

        let mut updated = Vec::new();
        let mut failed: Vec<FailedEntry> = Vec::new();
        for target in targets {
            let id = target.id.clone();
            let response = self
                .events
                .put_targets(&PutTargetsRequest {
                    rule: rule.name.clone(),
                    targets: vec![retarget(target, &arn, count)],
                })
                .await
                .map_err(DeployError::PutTargets)?;

            if response.failed_entry_count > 0 || !response.failed_entries.is_empty() {
                for entry in &response.failed_entries {
                    tracing::error!(rule = %rule.name, "failed to update the entry: {}", entry);
                }
                if response.failed_entries.is_empty() {
                    failed.push(FailedEntry {
                        target_id: Some(id),
                        ..Default::default()
                    });
                } else {
                    failed.extend(response.failed_entries);
                }
                continue;
            }

            tracing::debug!(rule = %rule.name, target = %id, "target updated");
            updated.push(id);
        }

        if let Some(failed) = NonEmpty::from_vec(failed) {
            return Err(DeployError::PartialUpdateFailure {
                rule: rule.name,
                failed,
            });
        }

        Ok(UpdateSummary {
            rule: rule.name,
            task_definition: arn,
            updated,
        })
    }

    async fn list_targets(&self, rule: &str) -> Result<Vec<Target>, DeployError> {
        let mut targets = Vec::new();
        let mut next_token = None;

        loop {
            let page = self
                .events
                .list_targets_by_rule(&ListTargetsByRuleRequest {
                    rule: rule.to_string(),
                    next_token,
                })
                .await
                .map_err(DeployError::ListTargets)?;

            targets.extend(page.targets);
            match page.next_token {
                Some(token) => next_token = Some(token),
                None => return Ok(targets),
            }
        }
    }
}

/// `target` with its task definition and count replaced; everything else kept.
pub fn retarget(mut target: Target, task_definition: &TaskDefinitionArn, count: i64) -> Target {
    let parameters = target.ecs_parameters.get_or_insert_with(Default::default);
    parameters.task_definition_arn = task_definition.to_string();
    parameters.task_count = Some(count);
    target
}
