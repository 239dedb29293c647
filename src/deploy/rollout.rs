// ABOUTME: Service rollout parameterized by state marker.
// ABOUTME: Each transition consumes self; failures after registration hand self back for rollback.

use std::fmt;
use std::sync::Arc;

use crate::api::{
    ApiError, DescribeServicesRequest, EcsApi, SchedulingStrategy, Service, UpdateServiceRequest,
};
use crate::types::TaskDefinitionArn;

use super::error::DeployError;
use super::service::ServiceDeployConfig;
use super::state::{BaseResolved, CanRollback, Described, Registered, Stable, Updated};
use super::strategy::CompletionStrategy;
use super::task_definition::{TaskDefinitionManager, arn_of};
use super::wait::{WaitError, race_deadline, watch_deployments, watch_running_tasks};

/// Result type for transitions that may need rollback on failure.
pub type TransitionResult<T, S> = Result<Rollout<T>, (Rollout<S>, DeployError)>;

/// A service rollout in progress, parameterized by its current state.
pub struct Rollout<S> {
    ecs: Arc<dyn EcsApi>,
    config: ServiceDeployConfig,
    service: Service,
    previous: TaskDefinitionArn,
    state: S,
}

impl<S: fmt::Debug> fmt::Debug for Rollout<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rollout")
            .field("config", &self.config)
            .field("service", &self.service.service_name)
            .field("previous", &self.previous)
            .field("state", &self.state)
            .finish()
    }
}

/// Build the update request pointing `service` at `task_definition`.
///
/// Daemon services get no desired count; the control plane rejects one there.
pub fn update_request(
    cluster: &str,
    service: &Service,
    task_definition: TaskDefinitionArn,
) -> UpdateServiceRequest {
    let desired_count = match service.scheduling_strategy {
        SchedulingStrategy::Daemon => None,
        SchedulingStrategy::Replica => Some(service.desired_count),
    };

    UpdateServiceRequest {
        cluster: cluster.to_string(),
        service: service.service_name.clone(),
        task_definition,
        desired_count,
        deployment_configuration: service.deployment_configuration.clone(),
    }
}

impl<S> Rollout<S> {
    fn transition<T>(self, state: T) -> Rollout<T> {
        Rollout {
            ecs: self.ecs,
            config: self.config,
            service: self.service,
            previous: self.previous,
            state,
        }
    }

    fn manager(&self) -> TaskDefinitionManager {
        TaskDefinitionManager::new(Arc::clone(&self.ecs))
    }

    /// The service as it was before this rollout.
    pub fn service(&self) -> &Service {
        &self.service
    }

    /// Revision the service ran before this rollout.
    pub fn previous(&self) -> &TaskDefinitionArn {
        &self.previous
    }

    pub fn config(&self) -> &ServiceDeployConfig {
        &self.config
    }
}

// =============================================================================
// Described -> BaseResolved
// =============================================================================

impl Rollout<Described> {
    /// Fetch the service named by `config`.
    ///
    /// # Errors
    ///
    /// `ServiceNotFound` when the cluster has no such service.
    pub async fn describe(
        ecs: Arc<dyn EcsApi>,
        config: ServiceDeployConfig,
    ) -> Result<Self, DeployError> {
        let response = ecs
            .describe_services(&DescribeServicesRequest {
                cluster: config.cluster.clone(),
                services: vec![config.service.clone()],
            })
            .await
            .map_err(DeployError::DescribeService)?;

        let service = response.services.into_iter().next().ok_or_else(|| {
            DeployError::ServiceNotFound {
                cluster: config.cluster.clone(),
                service: config.service.clone(),
            }
        })?;

        tracing::info!(
            service = %service.service_name,
            task_definition = %service.task_definition,
            desired = service.desired_count,
            "current service"
        );

        Ok(Rollout {
            previous: service.task_definition.clone(),
            ecs,
            config,
            service,
            state: Described,
        })
    }

    /// Fetch the current revision and choose the base for the new one.
    ///
    /// The explicit base reference wins; otherwise the current revision is reused.
    pub async fn resolve_base(self) -> Result<Rollout<BaseResolved>, DeployError> {
        let manager = self.manager();
        let current = manager.describe(self.previous.as_str()).await?;

        let base = match self.config.base_task_definition {
            Some(ref reference) => manager.describe(reference).await?,
            None => current.clone(),
        };
        tracing::debug!(base = %base.display_name(), "resolved base task definition");

        let mut next = self.transition(BaseResolved { base });
        if let Some(arn) = current.task_definition_arn {
            next.previous = arn;
        }
        Ok(next)
    }
}

// =============================================================================
// BaseResolved -> Registered
// =============================================================================

impl Rollout<BaseResolved> {
    pub fn base(&self) -> &crate::api::TaskDefinition {
        &self.state.base
    }

    pub async fn register(self) -> Result<Rollout<Registered>, DeployError> {
        let registered = self
            .manager()
            .register(&self.state.base, self.config.image.as_ref())
            .await?;
        let revision =
            arn_of(&registered, "RegisterTaskDefinition").map_err(DeployError::RegistrationFailed)?;

        Ok(self.transition(Registered { revision }))
    }
}

// =============================================================================
// Registered -> Updated
// =============================================================================

impl Rollout<Registered> {
    pub fn revision(&self) -> &TaskDefinitionArn {
        &self.state.revision
    }

    /// Point the service at the new revision.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` on failure to allow rollback.
    pub async fn update(self) -> TransitionResult<Updated, Registered> {
        let request = update_request(
            &self.config.cluster,
            &self.service,
            self.state.revision.clone(),
        );

        match self.ecs.update_service(&request).await {
            Ok(response) => {
                tracing::info!(
                    service = %self.service.service_name,
                    task_definition = %self.state.revision,
                    "service updated"
                );
                let revision = self.state.revision.clone();
                Ok(self.transition(Updated {
                    revision,
                    desired_count: response.service.desired_count,
                }))
            }
            Err(e) => Err((self, DeployError::UpdateService(e))),
        }
    }
}

// =============================================================================
// Updated -> Stable
// =============================================================================

impl Rollout<Updated> {
    pub fn revision(&self) -> &TaskDefinitionArn {
        &self.state.revision
    }

    /// Wait until the new revision is live, bounded by the configured timeout.
    ///
    /// A service with nothing desired is live immediately.
    ///
    /// # Errors
    ///
    /// Returns `(self, error)` on timeout or poll failure to allow rollback.
    pub async fn wait(self) -> TransitionResult<Stable, Updated> {
        let revision = self.state.revision.clone();

        if self.state.desired_count <= 0 {
            tracing::info!("desired count is zero, nothing to wait for");
            return Ok(self.transition(Stable { revision }));
        }

        tracing::info!(
            strategy = %self.config.completion,
            timeout_secs = self.config.timeout.as_secs(),
            "waiting for new tasks"
        );

        let ecs = Arc::clone(&self.ecs);
        let cluster = self.config.cluster.clone();
        let service = self.service.service_name.clone();
        let interval = self.config.poll_interval;
        let timeout = Some(self.config.timeout);

        let result = match self.config.completion {
            CompletionStrategy::Deployments => {
                race_deadline(
                    watch_deployments(ecs, cluster, service, revision.clone(), interval),
                    timeout,
                )
                .await
            }
            CompletionStrategy::RunningTasks => {
                race_deadline(
                    watch_running_tasks(ecs, cluster, service, revision.clone(), interval),
                    timeout,
                )
                .await
            }
        };

        match result {
            Ok(()) => {
                tracing::info!(task_definition = %revision, "new revision is live");
                Ok(self.transition(Stable { revision }))
            }
            Err(WaitError::Timeout(limit)) => Err((self, DeployError::Timeout(limit))),
            Err(WaitError::Monitor(e)) => Err((self, DeployError::Wait(e))),
            Err(WaitError::Aborted(reason)) => Err((self, DeployError::MonitorAborted(reason))),
        }
    }
}

// =============================================================================
// Rollback and completion
// =============================================================================

impl<S: CanRollback> Rollout<S> {
    /// Point the service back at its previous revision without waiting.
    pub async fn rollback(self) -> Result<TaskDefinitionArn, ApiError> {
        tracing::warn!(
            service = %self.service.service_name,
            task_definition = %self.previous,
            "rolling back"
        );

        let request = update_request(&self.config.cluster, &self.service, self.previous.clone());
        self.ecs.update_service(&request).await?;

        tracing::info!(task_definition = %self.previous, "rolled back");
        Ok(self.previous)
    }
}

impl Rollout<Stable> {
    /// The revision now running.
    pub fn finish(self) -> TaskDefinitionArn {
        self.state.revision
    }
}
