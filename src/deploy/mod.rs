// ABOUTME: Deploy orchestration: service rollouts, one-shot tasks, scheduled targets.
// ABOUTME: Service rollouts use the type state pattern; all remote access goes through api traits.

mod command;
mod error;
mod rollout;
mod scheduled;
mod service;
mod state;
mod strategy;
mod task;
mod task_definition;
pub mod wait;

pub use command::{CommandParseError, split_command};
pub use error::{DeployError, DeployErrorKind};
pub use rollout::{Rollout, TransitionResult, update_request};
pub use scheduled::{ScheduledTargetUpdater, UpdateSummary, retarget};
pub use service::{DEFAULT_TIMEOUT, ServiceDeployConfig, ServiceDeployer};
pub use state::{BaseResolved, CanRollback, Described, Registered, Stable, Updated};
pub use strategy::CompletionStrategy;
pub use task::{
    STARTED_BY, TaskRunConfig, TaskRunner, check_exit_codes, network_configuration, task_arns,
};
pub use task_definition::{TaskDefinitionManager, substitute_image};
pub use wait::POLL_INTERVAL;
