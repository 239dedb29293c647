// ABOUTME: Container image reference parsing for task definition updates.
// ABOUTME: Handles "repository" and "repository:tag"; more than one colon is rejected.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseImageError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("image format is wrong: {0} (expected repository or repository:tag)")]
    Ambiguous(String),

    #[error("image format is wrong: {0} has an empty repository or tag")]
    EmptyComponent(String),
}

/// A container image split into repository and optional tag.
///
/// `"nginx"` and `"nginx:latest"` are distinct values: a repository-only image
/// carries no tag, so substituting it into a container definition keeps the
/// tag that container already has.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Image {
    repository: String,
    tag: Option<String>,
}

impl Image {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: Some(tag.into()),
        }
    }

    pub fn repository_only(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: None,
        }
    }

    pub fn parse(input: &str) -> Result<Self, ParseImageError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageError::Empty);
        }

        let parts: Vec<&str> = input.split(':').collect();
        match parts.as_slice() {
            [repository] => Ok(Self::repository_only(*repository)),
            [repository, tag] => {
                if repository.is_empty() || tag.is_empty() {
                    return Err(ParseImageError::EmptyComponent(input.to_string()));
                }
                Ok(Self::new(*repository, *tag))
            }
            _ => Err(ParseImageError::Ambiguous(input.to_string())),
        }
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Apply this image over an existing reference of the same repository.
    ///
    /// The existing tag survives when this image has none.
    pub fn retag(&self, current: &Image) -> Image {
        Image {
            repository: self.repository.clone(),
            tag: self.tag.clone().or_else(|| current.tag.clone()),
        }
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repository)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Image {
    type Err = ParseImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
