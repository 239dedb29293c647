// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup and in-memory control-plane fixtures for integration tests.

// Each test binary only uses some of these helpers.
#![allow(dead_code)]

use ecsdeploy::api::{
    ContainerDefinition, MemoryControlPlane, SchedulingStrategy, Service, TaskDefinition,
};
use ecsdeploy::types::TaskDefinitionArn;
use std::sync::{Arc, Once};

pub const CLUSTER: &str = "prod";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("ecsdeploy=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn container(name: &str, image: &str) -> ContainerDefinition {
    let mut extra = serde_json::Map::new();
    extra.insert("essential".to_string(), serde_json::json!(true));
    ContainerDefinition {
        name: Some(name.to_string()),
        image: Some(image.to_string()),
        extra,
    }
}

pub fn task_definition(family: &str, containers: Vec<ContainerDefinition>) -> TaskDefinition {
    TaskDefinition {
        family: family.to_string(),
        container_definitions: containers,
        cpu: Some("256".to_string()),
        memory: Some("512".to_string()),
        network_mode: Some("awsvpc".to_string()),
        execution_role_arn: Some("arn:aws:iam::000000000000:role/exec".to_string()),
        requires_compatibilities: vec!["FARGATE".to_string()],
        ..Default::default()
    }
}

pub fn service(name: &str, task_definition: &TaskDefinitionArn, desired: i64) -> Service {
    Service {
        service_arn: None,
        service_name: name.to_string(),
        cluster_arn: None,
        task_definition: task_definition.clone(),
        desired_count: desired,
        running_count: desired,
        pending_count: 0,
        deployment_configuration: None,
        scheduling_strategy: SchedulingStrategy::Replica,
        deployments: Vec::new(),
        status: Some("ACTIVE".to_string()),
    }
}

/// A control plane with revision `web:1` (nginx + redis) behind service `web`.
pub fn web_service(desired: i64, strategy: SchedulingStrategy) -> (Arc<MemoryControlPlane>, TaskDefinitionArn) {
    let plane = Arc::new(MemoryControlPlane::new());
    let registered = plane.add_task_definition(task_definition(
        "web",
        vec![
            container("app", "nginx:latest"),
            container("cache", "redis:latest"),
        ],
    ));
    let arn = registered
        .task_definition_arn
        .expect("fixture revision has an ARN");

    let mut svc = service("web", &arn, desired);
    svc.scheduling_strategy = strategy;
    plane.add_service(CLUSTER, svc);

    (plane, arn)
}
