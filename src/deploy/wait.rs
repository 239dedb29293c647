// ABOUTME: Deadline-bounded waiting on background monitors and the polling monitors themselves.
// ABOUTME: Monitors only read from the control plane; completion checks are pure functions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::api::{
    ApiError, DescribeServicesRequest, DescribeTasksRequest, Deployment, EcsApi, Failure,
    ListTasksRequest, TASK_RUNNING, Task,
};
use crate::types::{TaskArn, TaskDefinitionArn};

/// Fixed cadence between polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Why a deadline-bounded wait ended without a result.
#[derive(Debug)]
pub enum WaitError<E> {
    /// The deadline fired first. The monitor is left running, detached.
    Timeout(Duration),
    /// The monitor finished with an error.
    Monitor(E),
    /// The monitor task panicked or was cancelled.
    Aborted(String),
}

/// Run `monitor` as a background task and wait for it, at most `timeout`.
///
/// `None` waits without a deadline.
pub async fn race_deadline<T, E, F>(monitor: F, timeout: Option<Duration>) -> Result<T, WaitError<E>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    let handle = tokio::spawn(monitor);

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => return Err(WaitError::Timeout(limit)),
        },
        None => handle.await,
    };

    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(WaitError::Monitor(e)),
        Err(e) => Err(WaitError::Aborted(e.to_string())),
    }
}

/// True once the rollout has collapsed to one fully running PRIMARY deployment of `target`.
pub fn deployment_complete(deployments: &[Deployment], target: &TaskDefinitionArn) -> bool {
    match deployments {
        [only] => {
            only.is_primary()
                && &only.task_definition == target
                && only.desired_count == only.running_count
        }
        _ => false,
    }
}

/// True once any task is running `target`.
pub fn task_running(tasks: &[Task], target: &TaskDefinitionArn) -> bool {
    tasks
        .iter()
        .any(|task| task.is_running() && &task.task_definition_arn == target)
}

/// True once every task has stopped.
pub fn all_stopped(tasks: &[Task]) -> bool {
    !tasks.is_empty() && tasks.iter().all(Task::is_stopped)
}

/// True when the control plane reported a failure for every requested task.
pub fn all_missing(requested: &[TaskArn], failures: &[Failure]) -> bool {
    !requested.is_empty()
        && requested.iter().all(|arn| {
            failures
                .iter()
                .any(|failure| failure.arn.as_deref() == Some(arn.as_str()))
        })
}

/// Poll the service until its deployments satisfy `deployment_complete`.
pub async fn watch_deployments(
    ecs: Arc<dyn EcsApi>,
    cluster: String,
    service: String,
    target: TaskDefinitionArn,
    interval: Duration,
) -> Result<(), ApiError> {
    let request = DescribeServicesRequest {
        cluster,
        services: vec![service.clone()],
    };

    loop {
        tokio::time::sleep(interval).await;

        let response = ecs.describe_services(&request).await?;
        let current = response
            .services
            .first()
            .ok_or_else(|| ApiError::NotFound(format!("service {}", service)))?;

        if deployment_complete(&current.deployments, &target) {
            return Ok(());
        }
        tracing::debug!(
            service = %service,
            deployments = current.deployments.len(),
            running = current.running_count,
            desired = current.desired_count,
            "rollout in progress"
        );
    }
}

/// Poll the service's running tasks until one runs `target`.
pub async fn watch_running_tasks(
    ecs: Arc<dyn EcsApi>,
    cluster: String,
    service: String,
    target: TaskDefinitionArn,
    interval: Duration,
) -> Result<(), ApiError> {
    loop {
        tokio::time::sleep(interval).await;

        let listed = ecs
            .list_tasks(&ListTasksRequest {
                cluster: cluster.clone(),
                service_name: Some(service.clone()),
                desired_status: Some(TASK_RUNNING.to_string()),
                next_token: None,
            })
            .await?;

        if listed.task_arns.is_empty() {
            tracing::debug!(service = %service, "no running tasks yet");
            continue;
        }

        let described = ecs
            .describe_tasks(&DescribeTasksRequest {
                cluster: cluster.clone(),
                tasks: listed.task_arns,
            })
            .await?;

        if task_running(&described.tasks, &target) {
            return Ok(());
        }
        tracing::debug!(service = %service, tasks = described.tasks.len(), "new revision not running yet");
    }
}

/// Poll `tasks` until all have stopped, returning their final state.
pub async fn watch_tasks_stopped(
    ecs: Arc<dyn EcsApi>,
    cluster: String,
    tasks: Vec<TaskArn>,
    interval: Duration,
) -> Result<Vec<Task>, ApiError> {
    let request = DescribeTasksRequest { cluster, tasks };

    loop {
        tokio::time::sleep(interval).await;

        let response = ecs.describe_tasks(&request).await?;
        if all_stopped(&response.tasks) {
            return Ok(response.tasks);
        }
        if all_missing(&request.tasks, &response.failures) {
            let arns: Vec<&str> = request.tasks.iter().map(TaskArn::as_str).collect();
            return Err(ApiError::NotFound(format!("tasks {}", arns.join(", "))));
        }

        let pending = response.tasks.iter().filter(|t| !t.is_stopped()).count();
        tracing::debug!(pending, "waiting for tasks to stop");
    }
}
