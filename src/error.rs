// ABOUTME: Application-wide error type for the stackpilot binary and settings layer.
// ABOUTME: Library layers keep their own enums; this one wraps them at the edge.

use std::path::PathBuf;
use thiserror::Error;

use crate::deploy::{DeployError, ParameterError};
use crate::stack::TemplateError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Parameters(#[from] ParameterError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
