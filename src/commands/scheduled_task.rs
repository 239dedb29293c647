// ABOUTME: `update scheduled-task` command implementation.
// ABOUTME: Repoints every target of a rule and reports which targets changed.

use super::connection::control_plane;
use crate::cli::ScheduledTaskArgs;
use ecsdeploy::config::Settings;
use ecsdeploy::deploy::ScheduledTargetUpdater;
use ecsdeploy::error::Result;
use ecsdeploy::output::Output;
use serde_json::json;

pub async fn update_scheduled_task(
    settings: &Settings,
    args: ScheduledTaskArgs,
    output: &mut Output,
) -> Result<()> {
    let client = control_plane(settings)?;
    let updater = ScheduledTargetUpdater::new(client.clone(), client);

    output.start_timer();
    output.progress(&format!(
        "Updating scheduled task {} to {} ({} task(s))",
        args.name, args.task_definition, args.count
    ));

    let summary = updater
        .update(&args.name, &args.task_definition, args.count)
        .await?;

    for id in &summary.updated {
        output.progress(&format!("  → Updated target {}", id));
    }
    output.success_with(
        &format!(
            "Updated {} target(s) of {} to {}",
            summary.updated.len(),
            summary.rule,
            summary.task_definition
        ),
        Some(json!({
            "rule": summary.rule,
            "taskDefinition": summary.task_definition.as_str(),
            "targets": summary.updated,
        })),
    );
    Ok(())
}
