// ABOUTME: One-shot task runs: launch a task, wait for it to stop, classify exit codes.
// ABOUTME: Launched tasks are always returned, even when the run fails.

use std::sync::Arc;
use std::time::Duration;

use crate::api::{
    AssignPublicIp, AwsVpcConfiguration, ContainerOverride, EcsApi, LaunchType,
    NetworkConfiguration, RunTaskRequest, Task, TaskDefinition, TaskOverride,
};
use crate::types::Image;

use super::command::split_command;
use super::error::DeployError;
use super::task_definition::{TaskDefinitionManager, arn_of};
use super::wait::{POLL_INTERVAL, WaitError, race_deadline, watch_tasks_stopped};

/// Marker recorded on every task this tool starts.
pub const STARTED_BY: &str = "ecsdeploy";

/// Everything a task run needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct TaskRunConfig {
    pub cluster: String,
    /// Container receiving the command override; defaults to the first container.
    pub container_name: Option<String>,
    pub base_task_definition: Option<String>,
    pub image: Option<Image>,
    /// Shell-style command line; empty means no override.
    pub command: String,
    pub launch_type: LaunchType,
    pub subnets: Vec<String>,
    pub security_groups: Vec<String>,
    /// `None` waits for the task indefinitely.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl TaskRunConfig {
    pub fn new(cluster: impl Into<String>, base_task_definition: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            container_name: None,
            base_task_definition: Some(base_task_definition.into()),
            image: None,
            command: String::new(),
            launch_type: LaunchType::default(),
            subnets: Vec::new(),
            security_groups: Vec::new(),
            timeout: None,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Network parameters for a launch.
///
/// Without subnets there are none, which FARGATE cannot run with. Only FARGATE
/// tasks get a public IP.
pub fn network_configuration(
    launch_type: LaunchType,
    subnets: &[String],
    security_groups: &[String],
) -> Result<Option<NetworkConfiguration>, DeployError> {
    if subnets.is_empty() {
        return match launch_type {
            LaunchType::Fargate => Err(DeployError::MissingSubnets),
            LaunchType::Ec2 => Ok(None),
        };
    }

    let assign_public_ip = match launch_type {
        LaunchType::Fargate => AssignPublicIp::Enabled,
        LaunchType::Ec2 => AssignPublicIp::Disabled,
    };

    Ok(Some(NetworkConfiguration {
        awsvpc_configuration: AwsVpcConfiguration {
            subnets: subnets.to_vec(),
            security_groups: security_groups.to_vec(),
            assign_public_ip,
        },
    }))
}

/// Succeeds only when every container of every task exited 0.
pub fn check_exit_codes(tasks: &[Task]) -> Result<(), DeployError> {
    for task in tasks {
        for container in &task.containers {
            let name = container.name.as_deref().unwrap_or("<unnamed>");
            match container.exit_code {
                None => {
                    return Err(DeployError::ExitCodeUnavailable {
                        task_arn: task.task_arn.clone(),
                        container: name.to_string(),
                    });
                }
                Some(0) => {}
                Some(exit_code) => {
                    return Err(DeployError::TaskFailed {
                        task_arn: task.task_arn.clone(),
                        container: name.to_string(),
                        exit_code,
                    });
                }
            }
        }
    }
    Ok(())
}

/// Runs one task to completion.
pub struct TaskRunner {
    ecs: Arc<dyn EcsApi>,
    config: TaskRunConfig,
    base: String,
    command: Vec<String>,
    network: Option<NetworkConfiguration>,
}

impl TaskRunner {
    /// Validate `config` up front; nothing is sent to the control plane here.
    pub fn new(ecs: Arc<dyn EcsApi>, config: TaskRunConfig) -> Result<Self, DeployError> {
        let base = config
            .base_task_definition
            .clone()
            .ok_or(DeployError::MissingTaskDefinition)?;
        let command = split_command(&config.command)?;
        let network =
            network_configuration(config.launch_type, &config.subnets, &config.security_groups)?;

        Ok(Self {
            ecs,
            config,
            base,
            command,
            network,
        })
    }

    /// Launch the task and wait for it to stop.
    ///
    /// Returns the launched tasks (in their last observed state when the wait
    /// finished) together with the outcome.
    pub async fn run(&self) -> (Vec<Task>, Result<(), DeployError>) {
        let request = match self.build_request().await {
            Ok(request) => request,
            Err(e) => return (Vec::new(), Err(e)),
        };

        let response = match self.ecs.run_task(&request).await {
            Ok(response) => response,
            Err(e) => {
                return (
                    Vec::new(),
                    Err(DeployError::RunTaskFailed {
                        reason: e.to_string(),
                    }),
                );
            }
        };

        if let Some(failure) = response.failures.first() {
            tracing::error!(failures = response.failures.len(), "run task reported failures");
            return (
                response.tasks,
                Err(DeployError::RunTaskFailed {
                    reason: failure.to_string(),
                }),
            );
        }
        if response.tasks.is_empty() {
            return (
                Vec::new(),
                Err(DeployError::RunTaskFailed {
                    reason: "no task was started".to_string(),
                }),
            );
        }

        for task in &response.tasks {
            tracing::info!(task = %task.task_arn, "task started");
        }

        match self.wait(&response.tasks).await {
            Ok(stopped) => {
                let outcome = check_exit_codes(&stopped);
                (stopped, outcome)
            }
            Err(e) => (response.tasks, Err(e)),
        }
    }

    async fn build_request(&self) -> Result<RunTaskRequest, DeployError> {
        let manager = TaskDefinitionManager::new(Arc::clone(&self.ecs));

        let (definition, task_definition) = match self.config.image {
            Some(ref image) => {
                let registered = manager.create(&self.base, Some(image)).await?;
                let arn = arn_of(&registered, "RegisterTaskDefinition")
                    .map_err(DeployError::RegistrationFailed)?;
                (registered, arn)
            }
            None => {
                let described = manager.describe(&self.base).await?;
                let arn = arn_of(&described, "DescribeTaskDefinition").map_err(|source| {
                    DeployError::DescribeTaskDefinition {
                        reference: self.base.clone(),
                        source,
                    }
                })?;
                (described, arn)
            }
        };

        Ok(RunTaskRequest {
            cluster: self.config.cluster.clone(),
            task_definition,
            count: 1,
            launch_type: self.config.launch_type,
            network_configuration: self.network.clone(),
            overrides: self.overrides(&definition)?,
            started_by: Some(STARTED_BY.to_string()),
        })
    }

    fn overrides(&self, definition: &TaskDefinition) -> Result<Option<TaskOverride>, DeployError> {
        if self.command.is_empty() {
            return Ok(None);
        }

        let name = match self.config.container_name {
            Some(ref name) => name.clone(),
            None => definition
                .container_definitions
                .first()
                .and_then(|c| c.name.clone())
                .ok_or_else(|| DeployError::MissingContainerName(definition.display_name()))?,
        };

        Ok(Some(TaskOverride {
            container_overrides: vec![ContainerOverride {
                name,
                command: self.command.clone(),
            }],
        }))
    }

    async fn wait(&self, tasks: &[Task]) -> Result<Vec<Task>, DeployError> {
        let arns = tasks.iter().map(|t| t.task_arn.clone()).collect();
        let monitor = watch_tasks_stopped(
            Arc::clone(&self.ecs),
            self.config.cluster.clone(),
            arns,
            self.config.poll_interval,
        );

        match race_deadline(monitor, self.config.timeout).await {
            Ok(stopped) => Ok(stopped),
            Err(WaitError::Timeout(limit)) => Err(DeployError::Timeout(limit)),
            Err(WaitError::Monitor(e)) => Err(DeployError::TaskWait(e)),
            Err(WaitError::Aborted(reason)) => Err(DeployError::MonitorAborted(reason)),
        }
    }
}

/// Convenience for callers that only need the ARN of a launched task.
pub fn task_arns(tasks: &[Task]) -> Vec<String> {
    tasks.iter().map(|t| t.task_arn.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Container;
    use crate::deploy::DeployErrorKind;
    use crate::types::{TaskArn, TaskDefinitionArn};

    fn stopped(codes: &[Option<i64>]) -> Task {
        Task {
            task_arn: TaskArn::new("arn:task/abc"),
            task_definition_arn: TaskDefinitionArn::new("td:1"),
            cluster_arn: None,
            last_status: "STOPPED".to_string(),
            desired_status: "STOPPED".to_string(),
            containers: codes
                .iter()
                .enumerate()
                .map(|(i, code)| Container {
                    name: Some(format!("c{}", i)),
                    exit_code: *code,
                    ..Default::default()
                })
                .collect(),
            launch_type: None,
            started_by: None,
            stopped_reason: None,
        }
    }

    #[test]
    fn all_zero_exit_codes_succeed() {
        assert!(check_exit_codes(&[stopped(&[Some(0), Some(0)])]).is_ok());
    }

    #[test]
    fn nonzero_exit_code_fails_with_code() {
        let err = check_exit_codes(&[stopped(&[Some(0), Some(7)])]).unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::RunFailure);
        assert_eq!(err.exit_code(), Some(7));
        assert!(err.to_string().contains("c1"));
    }

    #[test]
    fn missing_exit_code_is_unavailable() {
        let err = check_exit_codes(&[stopped(&[None])]).unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::ExitCodeUnavailable);
    }

    #[test]
    fn fargate_gets_public_ip() {
        let network = network_configuration(
            LaunchType::Fargate,
            &["subnet-1".to_string()],
            &["sg-1".to_string()],
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            network.awsvpc_configuration.assign_public_ip,
            AssignPublicIp::Enabled
        );
        assert_eq!(network.awsvpc_configuration.security_groups, vec!["sg-1"]);
    }

    #[test]
    fn ec2_with_subnets_has_no_public_ip() {
        let network = network_configuration(LaunchType::Ec2, &["subnet-1".to_string()], &[])
            .unwrap()
            .unwrap();
        assert_eq!(
            network.awsvpc_configuration.assign_public_ip,
            AssignPublicIp::Disabled
        );
    }

    #[test]
    fn ec2_without_subnets_has_no_network() {
        assert!(network_configuration(LaunchType::Ec2, &[], &[]).unwrap().is_none());
    }

    #[test]
    fn fargate_without_subnets_is_rejected() {
        let err = network_configuration(LaunchType::Fargate, &[], &[]).unwrap_err();
        assert_eq!(err.kind(), DeployErrorKind::InvalidInput);
    }
}
