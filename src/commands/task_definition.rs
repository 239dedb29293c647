// ABOUTME: `update task-definition` command implementation.
// ABOUTME: Registers a new revision of a base definition and prints its ARN.

use super::connection::control_plane;
use crate::cli::TaskDefinitionArgs;
use ecsdeploy::config::Settings;
use ecsdeploy::deploy::TaskDefinitionManager;
use ecsdeploy::error::Result;
use ecsdeploy::output::Output;
use serde_json::json;

pub async fn update_task_definition(
    settings: &Settings,
    args: TaskDefinitionArgs,
    output: &mut Output,
) -> Result<()> {
    let ecs = control_plane(settings)?;
    let manager = TaskDefinitionManager::new(ecs);

    output.start_timer();
    output.progress(&format!(
        "Registering a new revision of {}",
        args.base_task_definition
    ));

    let registered = manager
        .create(&args.base_task_definition, args.image.as_ref())
        .await?;
    let arn = registered
        .task_definition_arn
        .as_ref()
        .map(|arn| arn.to_string())
        .unwrap_or_else(|| registered.display_name());

    output.success_with(
        &arn,
        Some(json!({
            "taskDefinition": arn,
            "family": registered.family,
            "revision": registered.revision,
        })),
    );
    Ok(())
}
