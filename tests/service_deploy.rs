// ABOUTME: Integration tests for service deploys against the in-memory control plane.
// ABOUTME: Covers registration, cutover waiting, timeouts, and rollback.

mod support;

use ecsdeploy::api::SchedulingStrategy;
use ecsdeploy::api::memory::Operation;
use ecsdeploy::deploy::{
    CompletionStrategy, DeployError, DeployErrorKind, ServiceDeployConfig, ServiceDeployer,
};
use ecsdeploy::types::Image;
use std::time::Duration;
use support::{CLUSTER, container, init_tracing, task_definition, web_service};

fn config(image: Option<&str>) -> ServiceDeployConfig {
    let mut config = ServiceDeployConfig::new(CLUSTER, "web");
    config.image = image.map(|i| Image::parse(i).unwrap());
    config
}

mod deploy {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn registers_revision_and_waits_for_cutover() {
        init_tracing();
        let (plane, _) = web_service(2, SchedulingStrategy::Replica);

        let deployer = ServiceDeployer::new(plane.clone(), config(Some("nginx:master")));
        let revision = deployer.deploy().await.unwrap();

        assert!(revision.as_str().ends_with("task-definition/web:2"));

        let definitions = plane.task_definitions();
        let registered = definitions.last().unwrap();
        let images: Vec<_> = registered
            .container_definitions
            .iter()
            .map(|c| c.image.as_deref().unwrap())
            .collect();
        assert_eq!(images, vec!["nginx:master", "redis:latest"]);

        let updates = plane.update_requests();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].task_definition, revision);
        assert_eq!(updates[0].desired_count, Some(2));

        // Initial describe plus one poll after the update.
        assert_eq!(plane.count(Operation::DescribeServices), 2);
        assert_eq!(plane.service("web").unwrap().task_definition, revision);
    }

    #[tokio::test(start_paused = true)]
    async fn without_image_copies_current_revision() {
        let (plane, _) = web_service(1, SchedulingStrategy::Replica);

        let revision = ServiceDeployer::new(plane.clone(), config(None))
            .deploy()
            .await
            .unwrap();

        let definitions = plane.task_definitions();
        assert_eq!(definitions.len(), 2);
        assert_eq!(
            definitions[0].container_definitions,
            definitions[1].container_definitions
        );
        assert_eq!(definitions[1].task_definition_arn.as_ref(), Some(&revision));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_desired_count_skips_waiting() {
        let (plane, _) = web_service(0, SchedulingStrategy::Replica);
        plane.converge_after("web", None);

        ServiceDeployer::new(plane.clone(), config(Some("nginx:master")))
            .deploy()
            .await
            .unwrap();

        assert_eq!(plane.count(Operation::UpdateService), 1);
        assert_eq!(plane.count(Operation::DescribeServices), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn daemon_update_omits_desired_count() {
        let (plane, _) = web_service(3, SchedulingStrategy::Daemon);

        ServiceDeployer::new(plane.clone(), config(Some("nginx:master")))
            .deploy()
            .await
            .unwrap();

        let updates = plane.update_requests();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].desired_count, None);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_base_registers_from_that_family() {
        let (plane, _) = web_service(1, SchedulingStrategy::Replica);
        plane.add_task_definition(task_definition(
            "web-canary",
            vec![container("app", "nginx:canary")],
        ));

        let mut config = config(Some("nginx:v2"));
        config.base_task_definition = Some("web-canary".to_string());
        let revision = ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap();

        assert!(revision.as_str().ends_with("task-definition/web-canary:2"));
        let definitions = plane.task_definitions();
        let registered = definitions.last().unwrap();
        assert_eq!(
            registered.container_definitions[0].image.as_deref(),
            Some("nginx:v2")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn running_tasks_strategy_finishes_on_first_new_task() {
        let (plane, _) = web_service(2, SchedulingStrategy::Replica);
        plane.converge_after("web", Some(2));

        let mut config = config(Some("nginx:master"));
        config.completion = CompletionStrategy::RunningTasks;
        ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap();

        assert_eq!(plane.count(Operation::ListTasks), 2);
        // Only the initial describe; the wait never looks at deployments.
        assert_eq!(plane.count(Operation::DescribeServices), 1);
    }
}

mod failures {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn missing_service_is_not_found() {
        let (plane, _) = web_service(1, SchedulingStrategy::Replica);

        let err = ServiceDeployer::new(plane.clone(), ServiceDeployConfig::new(CLUSTER, "api"))
            .deploy()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::NotFound);
        assert!(matches!(err, DeployError::ServiceNotFound { .. }));
        assert_eq!(plane.count(Operation::RegisterTaskDefinition), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_when_rollout_never_settles() {
        let (plane, _) = web_service(2, SchedulingStrategy::Replica);
        plane.converge_after("web", None);

        let mut config = config(Some("nginx:master"));
        config.timeout = Duration::from_secs(12);
        let err = ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::Timeout);
        assert_eq!(err.to_string(), "process timeout after 12s");
        assert_eq!(plane.count(Operation::UpdateService), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn registration_failure_never_touches_service() {
        let (plane, _) = web_service(2, SchedulingStrategy::Replica);
        plane.fail_always(Operation::RegisterTaskDefinition, "throttled");

        let mut config = config(Some("nginx:master"));
        config.rollback = true;
        let err = ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::Remote);
        assert!(matches!(err, DeployError::RegistrationFailed(_)));
        assert_eq!(plane.count(Operation::UpdateService), 0);
    }
}

mod rollback {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timeout_rolls_back_to_previous_revision() {
        let (plane, previous) = web_service(2, SchedulingStrategy::Replica);
        plane.converge_after("web", None);

        let mut config = config(Some("nginx:master"));
        config.timeout = Duration::from_secs(12);
        config.rollback = true;
        let err = ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::Timeout);
        assert!(matches!(err, DeployError::RolledBack { .. }));
        assert!(matches!(err.original(), DeployError::Timeout(_)));

        let updates = plane.update_requests();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].task_definition, previous);
        assert_eq!(plane.service("web").unwrap().task_definition, previous);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_update_rolls_back() {
        let (plane, previous) = web_service(2, SchedulingStrategy::Replica);
        plane.fail_next(Operation::UpdateService, "service is draining");

        let mut config = config(Some("nginx:master"));
        config.rollback = true;
        let err = ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::Remote);
        assert!(matches!(err.original(), DeployError::UpdateService(_)));
        assert!(err.to_string().contains("can not update service"));

        let updates = plane.update_requests();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].task_definition, previous);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_rolls_back() {
        let (plane, previous) = web_service(2, SchedulingStrategy::Replica);
        plane.fail_after(Operation::DescribeServices, 1, "boom");

        let mut config = config(Some("nginx:master"));
        config.rollback = true;
        let err = ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::RolledBack { .. }));
        assert!(matches!(err.original(), DeployError::Wait(_)));
        assert_eq!(err.kind(), DeployErrorKind::Remote);
        assert!(err.to_string().contains("boom"));

        let updates = plane.update_requests();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[1].task_definition, previous);
        assert_eq!(plane.count(Operation::DescribeServices), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_rollback_reports_both_errors() {
        let (plane, previous) = web_service(2, SchedulingStrategy::Replica);
        plane.fail_always(Operation::UpdateService, "access denied");

        let mut config = config(Some("nginx:master"));
        config.rollback = true;
        let err = ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap_err();

        match err {
            DeployError::RollbackFailed { ref target, .. } => assert_eq!(target, &previous),
            ref other => panic!("expected RollbackFailed, got {other:?}"),
        }
        assert!(err.to_string().contains("rollback to"));
        assert_eq!(plane.count(Operation::UpdateService), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_rollback_leaves_new_revision() {
        let (plane, _) = web_service(2, SchedulingStrategy::Replica);
        plane.converge_after("web", None);

        let mut config = config(Some("nginx:master"));
        config.timeout = Duration::from_secs(12);
        let err = ServiceDeployer::new(plane.clone(), config)
            .deploy()
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Timeout(_)));
        assert!(
            plane
                .service("web")
                .unwrap()
                .task_definition
                .as_str()
                .ends_with("web:2")
        );
    }
}
