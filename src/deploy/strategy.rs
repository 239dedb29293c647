// ABOUTME: Completion strategy selection for service deploys.
// ABOUTME: Decides which predicate marks a rollout as finished.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a service deploy decides that the new revision is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStrategy {
    /// Wait until the service has a single PRIMARY deployment of the new
    /// revision with every desired task running. Old tasks are drained.
    #[default]
    Deployments,

    /// Wait until at least one running task of the service uses the new
    /// revision. Old tasks may still be running.
    #[serde(rename = "tasks")]
    RunningTasks,
}

impl CompletionStrategy {
    /// Strategy for the `--skip-check-deployments` flag, falling back to `configured`.
    pub fn for_flag(skip_check_deployments: bool, configured: CompletionStrategy) -> Self {
        if skip_check_deployments {
            CompletionStrategy::RunningTasks
        } else {
            configured
        }
    }
}

impl fmt::Display for CompletionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionStrategy::Deployments => write!(f, "deployments"),
            CompletionStrategy::RunningTasks => write!(f, "tasks"),
        }
    }
}
