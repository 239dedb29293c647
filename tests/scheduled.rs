// ABOUTME: Integration tests for scheduled task target updates.
// ABOUTME: Covers pagination, partial failures, and missing rules.

mod support;

use ecsdeploy::api::memory::Operation;
use ecsdeploy::api::{EcsParameters, LaunchType, MemoryControlPlane, Rule, Target};
use ecsdeploy::deploy::{DeployError, DeployErrorKind, ScheduledTargetUpdater};
use std::sync::Arc;
use support::{container, init_tracing, task_definition};

const RULE: &str = "nightly-report";

fn target(id: &str, task_definition: &str) -> Target {
    Target {
        id: id.to_string(),
        arn: "arn:aws:ecs:us-east-1:000000000000:cluster/prod".to_string(),
        role_arn: Some("arn:aws:iam::000000000000:role/events".to_string()),
        ecs_parameters: Some(EcsParameters {
            task_definition_arn: task_definition.to_string(),
            task_count: Some(1),
            launch_type: Some(LaunchType::Fargate),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Rule with three targets on `report:1`; `report:2` is registered.
fn plane() -> Arc<MemoryControlPlane> {
    let plane = Arc::new(MemoryControlPlane::new());
    let old = plane.add_task_definition(task_definition(
        "report",
        vec![container("app", "report:1.0")],
    ));
    plane.add_task_definition(task_definition(
        "report",
        vec![container("app", "report:1.1")],
    ));

    plane.add_rule(Rule {
        name: RULE.to_string(),
        schedule_expression: Some("cron(0 3 * * ? *)".to_string()),
        ..Default::default()
    });
    let old_arn = old.task_definition_arn.unwrap();
    for id in ["eu", "us", "ap"] {
        plane.add_target(RULE, target(id, old_arn.as_str()));
    }
    plane
}

fn updater(plane: &Arc<MemoryControlPlane>) -> ScheduledTargetUpdater {
    ScheduledTargetUpdater::new(plane.clone(), plane.clone())
}

#[tokio::test]
async fn every_target_points_at_new_revision() {
    init_tracing();
    let plane = plane();

    let summary = updater(&plane).update(RULE, "report:2", 3).await.unwrap();

    assert_eq!(summary.updated, vec!["eu", "us", "ap"]);
    assert!(summary.task_definition.as_str().ends_with("report:2"));
    for target in plane.targets(RULE) {
        let parameters = target.ecs_parameters.unwrap();
        assert_eq!(parameters.task_definition_arn, summary.task_definition.as_str());
        assert_eq!(parameters.task_count, Some(3));
        assert_eq!(parameters.launch_type, Some(LaunchType::Fargate));
        assert!(target.role_arn.is_some());
    }
    // One put per target.
    assert_eq!(plane.count(Operation::PutTargets), 3);
}

#[tokio::test]
async fn rejected_target_does_not_stop_the_others() {
    let plane = plane();
    plane.reject_target("us");

    let err = updater(&plane).update(RULE, "report", 2).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::PartialUpdateFailure);
    match err {
        DeployError::PartialUpdateFailure { ref failed, .. } => {
            assert_eq!(failed.len(), 1);
            assert_eq!(failed.head.target_id.as_deref(), Some("us"));
        }
        ref other => panic!("expected PartialUpdateFailure, got {other:?}"),
    }
    assert!(err.to_string().contains("ConcurrentModificationException"));

    let targets = plane.targets(RULE);
    let revision_of = |id: &str| {
        targets
            .iter()
            .find(|t| t.id == id)
            .and_then(|t| t.ecs_parameters.as_ref())
            .map(|p| p.task_definition_arn.clone())
            .unwrap()
    };
    assert!(revision_of("eu").ends_with("report:2"));
    assert!(revision_of("us").ends_with("report:1"));
    assert!(revision_of("ap").ends_with("report:2"));
}

#[tokio::test]
async fn follows_every_page_of_targets() {
    let plane = plane();
    plane.set_target_page_size(2);

    let summary = updater(&plane).update(RULE, "report:2", 1).await.unwrap();

    assert_eq!(summary.updated.len(), 3);
    assert_eq!(plane.count(Operation::ListTargetsByRule), 2);
}

#[tokio::test]
async fn missing_rule_is_not_found() {
    let plane = plane();

    let err = updater(&plane).update("weekly", "report:2", 1).await.unwrap_err();

    assert!(matches!(err, DeployError::RuleNotFound(ref name) if name == "weekly"));
    assert_eq!(err.kind(), DeployErrorKind::NotFound);
    assert_eq!(plane.count(Operation::PutTargets), 0);
}

#[tokio::test]
async fn unknown_task_definition_changes_nothing() {
    let plane = plane();

    let err = updater(&plane).update(RULE, "billing", 1).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::NotFound);
    assert_eq!(plane.count(Operation::ListTargetsByRule), 0);
    assert_eq!(plane.count(Operation::PutTargets), 0);
}
