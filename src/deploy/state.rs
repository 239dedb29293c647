// ABOUTME: Rollout state marker types for the type state pattern.
// ABOUTME: Each state carries the data that exists from that point on.

use crate::api::TaskDefinition;
use crate::types::TaskDefinitionArn;

/// Service fetched; its current revision is the rollback target.
/// Available actions: `resolve_base()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Described;

/// Base definition for the new revision known.
/// Available actions: `register()`
#[derive(Debug, Clone)]
pub struct BaseResolved {
    pub(crate) base: TaskDefinition,
}

/// New revision registered, service not yet pointed at it.
/// Available actions: `update()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Registered {
    pub(crate) revision: TaskDefinitionArn,
}

/// Service update accepted.
/// Available actions: `wait()`, `rollback()`
#[derive(Debug, Clone)]
pub struct Updated {
    pub(crate) revision: TaskDefinitionArn,
    pub(crate) desired_count: i64,
}

/// New revision live.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Stable {
    pub(crate) revision: TaskDefinitionArn,
}

/// States from which the service can be pointed back at its previous revision.
pub trait CanRollback {}

impl CanRollback for Registered {}
impl CanRollback for Updated {}
