// ABOUTME: `update service` command implementation.
// ABOUTME: Registers a revision, rolls the service to it, and reports the result.

use super::connection::control_plane;
use crate::cli::ServiceArgs;
use ecsdeploy::config::Settings;
use ecsdeploy::deploy::{CompletionStrategy, ServiceDeployConfig, ServiceDeployer};
use ecsdeploy::error::Result;
use ecsdeploy::output::Output;
use serde_json::json;
use std::time::Duration;

pub async fn update_service(settings: &Settings, args: ServiceArgs, output: &mut Output) -> Result<()> {
    let ecs = control_plane(settings)?;

    let config = ServiceDeployConfig {
        image: args.image,
        base_task_definition: args.base_task_definition,
        timeout: args
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(settings.timeout),
        rollback: args.enable_rollback || settings.rollback,
        completion: CompletionStrategy::for_flag(args.skip_check_deployments, settings.completion),
        poll_interval: settings.poll_interval,
        ..ServiceDeployConfig::new(args.cluster, args.service_name)
    };

    output.start_timer();
    output.progress(&format!(
        "Deploying service {} in cluster {}",
        config.service, config.cluster
    ));
    if let Some(ref image) = config.image {
        output.progress(&format!("  → Image: {}", image));
    }
    output.progress(&format!(
        "  → Waiting up to {}s ({})",
        config.timeout.as_secs(),
        config.completion
    ));

    let revision = ServiceDeployer::new(ecs, config.clone()).deploy().await?;

    output.success_with(
        &format!("Service {} is running {}", config.service, revision),
        Some(json!({
            "cluster": config.cluster,
            "service": config.service,
            "taskDefinition": revision.as_str(),
        })),
    );
    Ok(())
}
