// ABOUTME: Integration tests for task definition registration and image substitution.
// ABOUTME: Includes a property test that registration preserves the base verbatim.

mod support;

use ecsdeploy::api::memory::{Operation, Request};
use ecsdeploy::api::{
    ContainerDefinition, MemoryControlPlane, PlacementConstraint, RegisterTaskDefinitionRequest,
    TaskDefinition,
};
use ecsdeploy::deploy::{DeployErrorKind, TaskDefinitionManager};
use ecsdeploy::types::Image;
use proptest::prelude::*;
use std::sync::Arc;
use support::{container, init_tracing, task_definition};

fn manager() -> (Arc<MemoryControlPlane>, TaskDefinitionManager) {
    let plane = Arc::new(MemoryControlPlane::new());
    let manager = TaskDefinitionManager::new(plane.clone());
    (plane, manager)
}

mod substitution {
    use super::*;

    #[tokio::test]
    async fn only_matching_repository_changes() {
        init_tracing();
        let (plane, manager) = manager();
        let base = plane.add_task_definition(task_definition(
            "web",
            vec![
                container("app", "nginx:latest"),
                container("cache", "redis:latest"),
            ],
        ));

        let registered = manager
            .register(&base, Some(&Image::new("nginx", "master")))
            .await
            .unwrap();

        assert_eq!(registered.revision, Some(2));
        assert_eq!(
            registered.container_definitions[0].image.as_deref(),
            Some("nginx:master")
        );
        assert_eq!(
            registered.container_definitions[1],
            base.container_definitions[1]
        );
    }

    #[tokio::test]
    async fn repository_only_image_keeps_tag() {
        let (plane, manager) = manager();
        let base = plane.add_task_definition(task_definition(
            "web",
            vec![container("app", "nginx:1.25")],
        ));

        let registered = manager
            .register(&base, Some(&Image::repository_only("nginx")))
            .await
            .unwrap();

        assert_eq!(
            registered.container_definitions[0].image.as_deref(),
            Some("nginx:1.25")
        );
    }

    #[tokio::test]
    async fn unmodeled_fields_survive_registration() {
        let (plane, manager) = manager();
        let mut definition = task_definition("web", vec![container("app", "nginx:1.25")]);
        definition.extra.insert(
            "runtimePlatform".to_string(),
            serde_json::json!({"cpuArchitecture": "ARM64"}),
        );
        definition
            .extra
            .insert("registeredBy".to_string(), serde_json::json!("arn:aws:iam::1:user/ci"));
        let base = plane.add_task_definition(definition);

        let registered = manager
            .register(&base, Some(&Image::new("nginx", "master")))
            .await
            .unwrap();

        assert_eq!(
            registered.extra.get("runtimePlatform"),
            Some(&serde_json::json!({"cpuArchitecture": "ARM64"}))
        );
        assert!(!registered.extra.contains_key("registeredBy"));
    }

    #[tokio::test]
    async fn malformed_container_image_is_format_error() {
        let (plane, manager) = manager();
        let base = plane.add_task_definition(task_definition(
            "web",
            vec![container("app", "registry:5000/nginx:1.25")],
        ));

        let err = manager
            .register(&base, Some(&Image::new("nginx", "master")))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::Format);
        assert_eq!(plane.count(Operation::RegisterTaskDefinition), 0);
    }
}

mod lookup {
    use super::*;

    #[tokio::test]
    async fn create_describes_then_registers() {
        let (plane, manager) = manager();
        plane.add_task_definition(task_definition("worker", vec![container("app", "worker:1")]));

        let registered = manager
            .create("worker:1", Some(&Image::new("worker", "2")))
            .await
            .unwrap();

        assert_eq!(registered.display_name(), "worker:2");
        let operations: Vec<_> = plane.requests().iter().map(Request::operation).collect();
        assert_eq!(
            operations,
            vec![
                Operation::DescribeTaskDefinition,
                Operation::RegisterTaskDefinition
            ]
        );
    }

    #[tokio::test]
    async fn missing_definition_is_not_found() {
        let (_, manager) = manager();

        let err = manager.describe("worker:9").await.unwrap_err();

        assert_eq!(err.kind(), DeployErrorKind::NotFound);
        assert!(err.to_string().contains("worker:9"));
    }
}

prop_compose! {
    fn arb_container()(
        name in "[a-z]{1,10}",
        repository in "[a-z]{1,10}",
        tag in "[a-z0-9.]{1,6}",
        essential in any::<bool>(),
    ) -> ContainerDefinition {
        let mut extra = serde_json::Map::new();
        extra.insert("essential".to_string(), serde_json::json!(essential));
        ContainerDefinition {
            name: Some(name),
            image: Some(format!("{repository}:{tag}")),
            extra,
        }
    }
}

prop_compose! {
    fn arb_definition()(
        family in "[a-z][a-z0-9-]{0,15}",
        containers in prop::collection::vec(arb_container(), 1..4),
        cpu in prop::option::of("[0-9]{3,4}"),
        memory in prop::option::of("[0-9]{3,4}"),
        network_mode in prop::option::of(prop::sample::select(vec!["awsvpc", "bridge", "host"])),
        task_role_arn in prop::option::of("arn:aws:iam::[0-9]{12}:role/[a-z]{1,8}"),
        constraint in prop::option::of("attribute:[a-z]{1,8} == [a-z]{1,8}"),
    ) -> TaskDefinition {
        TaskDefinition {
            family,
            container_definitions: containers,
            cpu,
            memory,
            network_mode: network_mode.map(str::to_string),
            task_role_arn,
            placement_constraints: constraint
                .map(|expression| PlacementConstraint {
                    kind: "memberOf".to_string(),
                    expression: Some(expression),
                })
                .into_iter()
                .collect(),
            ..Default::default()
        }
    }
}

proptest! {
    #[test]
    fn registering_without_image_preserves_base(definition in arb_definition()) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let (plane, manager) = manager();
        let base = plane.add_task_definition(definition);
        let registered = runtime.block_on(manager.register(&base, None)).unwrap();

        let sent = plane
            .requests()
            .into_iter()
            .find_map(|r| match r {
                Request::RegisterTaskDefinition(request) => Some(request),
                _ => None,
            })
            .unwrap();
        prop_assert_eq!(
            sent,
            RegisterTaskDefinitionRequest::from_base(&base, base.container_definitions.clone())
        );

        prop_assert_eq!(&registered.family, &base.family);
        prop_assert_eq!(&registered.container_definitions, &base.container_definitions);
        prop_assert_eq!(&registered.cpu, &base.cpu);
        prop_assert_eq!(&registered.memory, &base.memory);
        prop_assert_eq!(&registered.network_mode, &base.network_mode);
        prop_assert_eq!(&registered.task_role_arn, &base.task_role_arn);
        prop_assert_eq!(&registered.placement_constraints, &base.placement_constraints);
        prop_assert_eq!(registered.revision, base.revision.map(|r| r + 1));
    }
}
