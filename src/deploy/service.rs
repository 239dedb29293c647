// ABOUTME: Service deploys: register a revision, update the service, wait, roll back on failure.
// ABOUTME: Drives the Rollout state machine from a fixed configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::api::EcsApi;
use crate::types::{Image, TaskDefinitionArn};

use super::error::DeployError;
use super::rollout::Rollout;
use super::state::CanRollback;
use super::strategy::CompletionStrategy;
use super::wait::POLL_INTERVAL;

/// Default deadline for a rollout to become live.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything a service deploy needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct ServiceDeployConfig {
    pub cluster: String,
    pub service: String,
    /// Image to substitute; `None` redeploys the base definition's images.
    pub image: Option<Image>,
    /// Base for the new revision; `None` uses the service's current revision.
    pub base_task_definition: Option<String>,
    pub timeout: Duration,
    pub rollback: bool,
    pub completion: CompletionStrategy,
    pub poll_interval: Duration,
}

impl ServiceDeployConfig {
    pub fn new(cluster: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            service: service.into(),
            image: None,
            base_task_definition: None,
            timeout: DEFAULT_TIMEOUT,
            rollback: false,
            completion: CompletionStrategy::default(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Rolls a service to a new task definition revision.
pub struct ServiceDeployer {
    ecs: Arc<dyn EcsApi>,
    config: ServiceDeployConfig,
}

impl ServiceDeployer {
    pub fn new(ecs: Arc<dyn EcsApi>, config: ServiceDeployConfig) -> Self {
        Self { ecs, config }
    }

    pub fn config(&self) -> &ServiceDeployConfig {
        &self.config
    }

    /// Deploy and return the revision now running.
    ///
    /// Failures before the service update abort without side effects beyond the
    /// registered revision. Failures from the update on roll back when enabled;
    /// the returned error still carries the original failure.
    pub async fn deploy(&self) -> Result<TaskDefinitionArn, DeployError> {
        let registered = Rollout::describe(Arc::clone(&self.ecs), self.config.clone())
            .await?
            .resolve_base()
            .await?
            .register()
            .await?;

        let updated = match registered.update().await {
            Ok(updated) => updated,
            Err((registered, e)) => return Err(self.recover(registered, e).await),
        };

        match updated.wait().await {
            Ok(stable) => Ok(stable.finish()),
            Err((updated, e)) => Err(self.recover(updated, e).await),
        }
    }

    async fn recover<S: CanRollback>(&self, rollout: Rollout<S>, error: DeployError) -> DeployError {
        if !self.config.rollback {
            return error;
        }

        tracing::warn!(error = %error, "deploy failed");
        let target = rollout.previous().clone();
        match rollout.rollback().await {
            Ok(target) => DeployError::RolledBack {
                source: Box::new(error),
                target,
            },
            Err(rollback) => {
                tracing::error!(error = %rollback, "rollback failed");
                DeployError::RollbackFailed {
                    source: Box::new(error),
                    target,
                    rollback,
                }
            }
        }
    }
}
