// ABOUTME: Error types for service deploys, task runs, and scheduled target updates.
// ABOUTME: Messages name the failing step; `kind()` gives the coarse category.

use crate::api::{ApiError, FailedEntry};
use crate::types::{ParseImageError, TaskArn, TaskDefinitionArn};
use nonempty::NonEmpty;
use std::time::Duration;

use super::command::CommandParseError;

/// Coarse error categories for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// Malformed image reference.
    Format,
    /// Service, task definition, or rule absent.
    NotFound,
    /// Any other control-plane failure.
    Remote,
    /// Deadline exceeded while waiting.
    Timeout,
    /// A container exited nonzero.
    RunFailure,
    ExitCodeUnavailable,
    PartialUpdateFailure,
    MissingTaskDefinition,
    /// Parameters that can never produce a valid request.
    InvalidInput,
}

/// Errors from deploy, run, and scheduled-update operations.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("image format is wrong: {image}: {source}")]
    InvalidImage {
        image: String,
        source: ParseImageError,
    },

    #[error("service {service} not found in cluster {cluster}")]
    ServiceNotFound { cluster: String, service: String },

    #[error("can not get current service: {0}")]
    DescribeService(#[source] ApiError),

    #[error("can not get task definition {reference}: {source}")]
    DescribeTaskDefinition { reference: String, source: ApiError },

    #[error("can not register task definition: {0}")]
    RegistrationFailed(#[source] ApiError),

    #[error("can not update service: {0}")]
    UpdateService(#[source] ApiError),

    #[error("failed while waiting for the deployment: {0}")]
    Wait(#[source] ApiError),

    #[error("failed while waiting for the task to stop: {0}")]
    TaskWait(#[source] ApiError),

    #[error("process timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("monitor stopped unexpectedly: {0}")]
    MonitorAborted(String),

    #[error("can not run task: {reason}")]
    RunTaskFailed { reason: String },

    #[error("task {task_arn} container {container} exited with code {exit_code}")]
    TaskFailed {
        task_arn: TaskArn,
        container: String,
        exit_code: i64,
    },

    #[error("can not read exit code of container {container} in task {task_arn}")]
    ExitCodeUnavailable { task_arn: TaskArn, container: String },

    #[error("task definition is required")]
    MissingTaskDefinition,

    #[error("FARGATE launch type requires at least one subnet")]
    MissingSubnets,

    #[error("task definition {0} has no container to override")]
    MissingContainerName(String),

    #[error("invalid command: {0}")]
    InvalidCommand(#[from] CommandParseError),

    #[error("rule {0} not found")]
    RuleNotFound(String),

    #[error("can not get rule: {0}")]
    DescribeRule(#[source] ApiError),

    #[error("can not list targets: {0}")]
    ListTargets(#[source] ApiError),

    #[error("can not put targets: {0}")]
    PutTargets(#[source] ApiError),

    #[error(
        "failed to update {} target(s) of rule {rule}: {}",
        .failed.len(),
        .failed.head
    )]
    PartialUpdateFailure {
        rule: String,
        failed: NonEmpty<FailedEntry>,
    },

    #[error("{source} (rolled back to {target})")]
    RolledBack {
        source: Box<DeployError>,
        target: TaskDefinitionArn,
    },

    #[error("{source} (rollback to {target} failed: {rollback})")]
    RollbackFailed {
        source: Box<DeployError>,
        target: TaskDefinitionArn,
        rollback: ApiError,
    },
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::InvalidImage { .. } => DeployErrorKind::Format,
            DeployError::ServiceNotFound { .. } | DeployError::RuleNotFound(_) => {
                DeployErrorKind::NotFound
            }
            DeployError::DescribeService(source)
            | DeployError::DescribeTaskDefinition { source, .. }
            | DeployError::TaskWait(source) => {
                if source.is_not_found() {
                    DeployErrorKind::NotFound
                } else {
                    DeployErrorKind::Remote
                }
            }
            DeployError::RegistrationFailed(_)
            | DeployError::UpdateService(_)
            | DeployError::Wait(_)
            | DeployError::MonitorAborted(_)
            | DeployError::RunTaskFailed { .. }
            | DeployError::DescribeRule(_)
            | DeployError::ListTargets(_)
            | DeployError::PutTargets(_) => DeployErrorKind::Remote,
            DeployError::Timeout(_) => DeployErrorKind::Timeout,
            DeployError::TaskFailed { .. } => DeployErrorKind::RunFailure,
            DeployError::ExitCodeUnavailable { .. } => DeployErrorKind::ExitCodeUnavailable,
            DeployError::MissingTaskDefinition => DeployErrorKind::MissingTaskDefinition,
            DeployError::MissingSubnets
            | DeployError::MissingContainerName(_)
            | DeployError::InvalidCommand(_) => DeployErrorKind::InvalidInput,
            DeployError::PartialUpdateFailure { .. } => DeployErrorKind::PartialUpdateFailure,
            DeployError::RolledBack { source, .. } | DeployError::RollbackFailed { source, .. } => {
                source.kind()
            }
        }
    }

    /// Exit code of the failing container for run failures.
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            DeployError::TaskFailed { exit_code, .. } => Some(*exit_code),
            DeployError::RolledBack { source, .. } | DeployError::RollbackFailed { source, .. } => {
                source.exit_code()
            }
            _ => None,
        }
    }

    /// The error that triggered a rollback, or `self` when none ran.
    pub fn original(&self) -> &DeployError {
        match self {
            DeployError::RolledBack { source, .. } | DeployError::RollbackFailed { source, .. } => {
                source.original()
            }
            other => other,
        }
    }
}
