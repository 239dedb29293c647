// ABOUTME: Control-plane collaborator traits, wire models, and client implementations.
// ABOUTME: The deploy core depends only on the traits, held as `Arc<dyn ...>`.

mod ecs;
mod error;
mod events;
pub mod http;
pub mod memory;
mod models;

pub use ecs::{
    DescribeServicesRequest, DescribeServicesResponse, DescribeTaskDefinitionRequest,
    DescribeTasksRequest, DescribeTasksResponse, EcsApi, ListTasksRequest, ListTasksResponse,
    RegisterTaskDefinitionRequest, RunTaskRequest, RunTaskResponse, TaskDefinitionResponse,
    UpdateServiceRequest, UpdateServiceResponse,
};
pub use error::ApiError;
pub use events::{
    DescribeRuleRequest, EcsParameters, EventsApi, FailedEntry, ListTargetsByRuleRequest,
    ListTargetsByRuleResponse, PutTargetsRequest, PutTargetsResponse, Rule, Target,
};
pub use http::{ClientConfig, HttpControlPlane, HttpError};
pub use memory::MemoryControlPlane;
pub use models::{
    AssignPublicIp, AwsVpcConfiguration, Container, ContainerDefinition, ContainerOverride,
    DEPLOYMENT_PRIMARY, Deployment, DeploymentConfiguration, Failure, LaunchType,
    NetworkConfiguration, PlacementConstraint, SchedulingStrategy, Service, TASK_PENDING,
    TASK_RUNNING, TASK_STOPPED, Task, TaskDefinition, TaskOverride,
};
