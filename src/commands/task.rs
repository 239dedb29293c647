// ABOUTME: `run task` command implementation.
// ABOUTME: Runs a task to completion and reports its ARNs and exit status.

use super::connection::control_plane;
use crate::cli::TaskArgs;
use ecsdeploy::api::LaunchType;
use ecsdeploy::config::Settings;
use ecsdeploy::deploy::{TaskRunConfig, TaskRunner, task_arns};
use ecsdeploy::error::Result;
use ecsdeploy::output::Output;
use serde_json::json;
use std::time::Duration;

pub async fn run_task(settings: &Settings, args: TaskArgs, output: &mut Output) -> Result<()> {
    let ecs = control_plane(settings)?;

    let config = TaskRunConfig {
        cluster: args.cluster,
        container_name: args.container_name,
        base_task_definition: args.task_definition,
        image: args.image,
        command: args.command,
        launch_type: if args.fargate {
            LaunchType::Fargate
        } else {
            LaunchType::Ec2
        },
        subnets: args.subnets,
        security_groups: args.security_groups,
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        poll_interval: settings.poll_interval,
    };
    let runner = TaskRunner::new(ecs, config.clone())?;

    output.start_timer();
    output.progress(&format!(
        "Running task in cluster {} ({})",
        config.cluster, config.launch_type
    ));

    let (tasks, outcome) = runner.run().await;
    let arns = task_arns(&tasks);
    for arn in &arns {
        output.progress(&format!("  → Task {}", arn));
    }

    match outcome {
        Ok(()) => {
            output.success_with(
                "Task finished successfully",
                Some(json!({ "cluster": config.cluster, "tasks": arns })),
            );
            Ok(())
        }
        Err(e) => {
            tracing::debug!(tasks = ?arns, exit_code = ?e.exit_code(), "task run failed");
            Err(e.into())
        }
    }
}
