// ABOUTME: ARN newtypes tagged with the kind of resource they name.
// ABOUTME: Serialized as plain strings; the kind exists only at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskDefinitionKind {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterKind {}

/// The ARN (or short name) of a control-plane resource of kind `K`.
///
/// `UpdateService` takes a task definition ARN and `DescribeTasks` takes task
/// ARNs; keeping the kind in the type stops one from reaching the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Arn<K> {
    name: String,
    #[serde(skip)]
    kind: PhantomData<K>,
}

impl<K> Arn<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn into_inner(self) -> String {
        self.name
    }
}

impl<K> PartialEq<str> for Arn<K> {
    fn eq(&self, other: &str) -> bool {
        self.name == other
    }
}

impl<K> fmt::Display for Arn<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub type TaskDefinitionArn = Arn<TaskDefinitionKind>;
pub type TaskArn = Arn<TaskKind>;
pub type ClusterArn = Arn<ClusterKind>;
