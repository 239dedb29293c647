// ABOUTME: Task definition lookup and new-revision registration with image substitution.
// ABOUTME: A new revision copies its base verbatim except for matching container images.

use std::sync::Arc;

use crate::api::{
    ApiError, ContainerDefinition, DescribeTaskDefinitionRequest, EcsApi,
    RegisterTaskDefinitionRequest, TaskDefinition,
};
use crate::types::{Image, TaskDefinitionArn};

use super::error::DeployError;

/// Describes and registers task definition revisions.
#[derive(Clone)]
pub struct TaskDefinitionManager {
    ecs: Arc<dyn EcsApi>,
}

impl TaskDefinitionManager {
    pub fn new(ecs: Arc<dyn EcsApi>) -> Self {
        Self { ecs }
    }

    /// Fetch a task definition by family, `family:revision`, or ARN.
    pub async fn describe(&self, reference: &str) -> Result<TaskDefinition, DeployError> {
        tracing::debug!(reference, "describing task definition");

        let request = DescribeTaskDefinitionRequest {
            task_definition: reference.to_string(),
        };
        self.ecs
            .describe_task_definition(&request)
            .await
            .map(|resp| resp.task_definition)
            .map_err(|source| DeployError::DescribeTaskDefinition {
                reference: reference.to_string(),
                source,
            })
    }

    /// Register a new revision of `base`, substituting `image` where the repository matches.
    ///
    /// With no image the revision is an exact copy of the base.
    pub async fn register(
        &self,
        base: &TaskDefinition,
        image: Option<&Image>,
    ) -> Result<TaskDefinition, DeployError> {
        let containers = base
            .container_definitions
            .iter()
            .map(|container| substitute_image(container, image))
            .collect::<Result<Vec<_>, _>>()?;

        let request = RegisterTaskDefinitionRequest::from_base(base, containers);
        let registered = self
            .ecs
            .register_task_definition(&request)
            .await
            .map_err(DeployError::RegistrationFailed)?
            .task_definition;

        tracing::info!(
            family = %registered.family,
            revision = registered.revision.unwrap_or_default(),
            "registered task definition"
        );
        Ok(registered)
    }

    /// Describe `base_reference` and register a new revision of it.
    pub async fn create(
        &self,
        base_reference: &str,
        image: Option<&Image>,
    ) -> Result<TaskDefinition, DeployError> {
        let base = self.describe(base_reference).await?;
        self.register(&base, image).await
    }
}

/// The ARN of a described or registered task definition.
pub(crate) fn arn_of(
    definition: &TaskDefinition,
    operation: &'static str,
) -> Result<TaskDefinitionArn, ApiError> {
    definition
        .task_definition_arn
        .clone()
        .ok_or_else(|| ApiError::Decode {
            operation,
            message: format!("task definition {} has no ARN", definition.display_name()),
        })
}

/// Apply `image` to one container definition.
///
/// The container is returned unchanged when there is no image, when it has no
/// image of its own, or when its repository differs from `image`'s.
pub fn substitute_image(
    container: &ContainerDefinition,
    image: Option<&Image>,
) -> Result<ContainerDefinition, DeployError> {
    let (Some(image), Some(current)) = (image, container.image.as_deref()) else {
        return Ok(container.clone());
    };

    let current_image = Image::parse(current).map_err(|source| DeployError::InvalidImage {
        image: current.to_string(),
        source,
    })?;

    if current_image.repository() != image.repository() {
        return Ok(container.clone());
    }

    let mut updated = container.clone();
    updated.image = Some(image.retag(&current_image).to_string());
    Ok(updated)
}
