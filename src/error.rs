// ABOUTME: Application-wide error types for ecsdeploy.
// ABOUTME: Uses thiserror; the binary prints these and exits non-zero.

use crate::api::HttpError;
use crate::deploy::DeployError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("can not create control-plane client: {0}")]
    Client(#[from] HttpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
