// ABOUTME: Error types for stack deployment, rollback, destroy and import.
// ABOUTME: Remote failures carry the stack name; kind() supports programmatic handling.

use super::lock::LockInfo;
use super::parameters::ParameterError;
use crate::assets::{AssetError, PublishError};
use crate::environment::EnvironmentError;
use crate::provider::ProvisionError;

/// Errors that can occur while driving a stack lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// The deployed bootstrap stack is too old or its version is unreadable.
    #[error("{stack}: {source}")]
    BootstrapVersionMismatch {
        stack: String,
        source: EnvironmentError,
    },

    /// A declared parameter has no override, previous value or default.
    #[error("{stack}: {source}")]
    MissingParameterValue {
        stack: String,
        source: ParameterError,
    },

    /// Options that cannot be combined or are incomplete.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An asset declares a packaging this tool does not know.
    #[error("{stack}: Unsupported packaging type: {packaging}")]
    UnsupportedAssetPackaging { stack: String, packaging: String },

    /// A resource to import has a type the service cannot import.
    #[error("Import is not supported for resource type {resource_type} ({logical_id})")]
    UnsupportedResourceType {
        logical_id: String,
        resource_type: String,
    },

    /// The rollback loop ran out of iterations.
    #[error(
        "{stack}: Rollback did not finish after {iterations} iterations; stopping because it looks like we're not making progress anymore. You can retry if rollback was progressing as expected."
    )]
    RollbackNoProgress { stack: String, iterations: u32 },

    /// Rollback ended in a failed state.
    #[error(
        "{stack}: {message} (fix problem and retry, or orphan these resources using --orphan or --force)"
    )]
    RollbackFailed { stack: String, message: String },

    /// A stack operation finished in a failed state.
    #[error("{stack}: {message}")]
    StackOperationFailed { stack: String, message: String },

    /// A remote call failed.
    #[error("{stack}: {source}")]
    Remote {
        stack: String,
        source: ProvisionError,
    },

    /// Credentials or environment resolution failed.
    #[error("{stack}: {source}")]
    Environment {
        stack: String,
        source: EnvironmentError,
    },

    /// Asset metadata could not be prepared.
    #[error("{stack}: {source}")]
    Asset { stack: String, source: AssetError },

    /// The publisher reported failures while building.
    #[error("Failed to build asset {asset}")]
    AssetBuildFailed { asset: String },

    /// The publisher reported failures while publishing.
    #[error("Failed to publish asset {asset}")]
    AssetPublishFailed { asset: String },

    /// The publisher returned an error.
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Another operation holds the stack.
    #[error("{stack}: {} has been running since {}", .info.operation, .info.started_at)]
    StackBusy { stack: String, info: LockInfo },

    /// The user declined to continue.
    #[error("Aborted by user")]
    Aborted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    BootstrapVersionMismatch,
    MissingParameterValue,
    InvalidConfiguration,
    UnsupportedAssetPackaging,
    UnsupportedResourceType,
    RollbackNoProgress,
    StackOperationFailed,
    StackBusy,
    Environment,
    Asset,
    Aborted,
    Io,
}

impl DeployError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::BootstrapVersionMismatch { .. } => DeployErrorKind::BootstrapVersionMismatch,
            DeployError::MissingParameterValue { .. } => DeployErrorKind::MissingParameterValue,
            DeployError::InvalidConfiguration(_) => DeployErrorKind::InvalidConfiguration,
            DeployError::UnsupportedAssetPackaging { .. } => {
                DeployErrorKind::UnsupportedAssetPackaging
            }
            DeployError::UnsupportedResourceType { .. } => DeployErrorKind::UnsupportedResourceType,
            DeployError::RollbackNoProgress { .. } => DeployErrorKind::RollbackNoProgress,
            DeployError::RollbackFailed { .. }
            | DeployError::StackOperationFailed { .. }
            | DeployError::Remote { .. } => DeployErrorKind::StackOperationFailed,
            DeployError::StackBusy { .. } => DeployErrorKind::StackBusy,
            DeployError::Environment { .. } => DeployErrorKind::Environment,
            DeployError::Asset { .. }
            | DeployError::AssetBuildFailed { .. }
            | DeployError::AssetPublishFailed { .. }
            | DeployError::Publish(_) => DeployErrorKind::Asset,
            DeployError::Aborted => DeployErrorKind::Aborted,
            DeployError::Io(_) => DeployErrorKind::Io,
        }
    }

    /// Wrap a remote failure with the stack it concerns.
    pub fn remote(stack: &str, source: ProvisionError) -> Self {
        DeployError::Remote {
            stack: stack.to_string(),
            source,
        }
    }

    /// Wrap an environment failure, classifying bootstrap version problems.
    pub fn environment(stack: &str, source: EnvironmentError) -> Self {
        use crate::environment::EnvironmentErrorKind;
        match source.kind() {
            EnvironmentErrorKind::BootstrapVersion | EnvironmentErrorKind::BootstrapMissing => {
                DeployError::BootstrapVersionMismatch {
                    stack: stack.to_string(),
                    source,
                }
            }
            _ => DeployError::Environment {
                stack: stack.to_string(),
                source,
            },
        }
    }

    /// Wrap an asset preparation failure, surfacing unknown packaging on its own.
    pub fn asset(stack: &str, source: AssetError) -> Self {
        match source {
            AssetError::UnsupportedPackaging(packaging) => DeployError::UnsupportedAssetPackaging {
                stack: stack.to_string(),
                packaging,
            },
            AssetError::InvalidConfiguration(message) => {
                DeployError::InvalidConfiguration(format!("{stack}: {message}"))
            }
            AssetError::Environment(source) => DeployError::environment(stack, source),
            other => DeployError::Asset {
                stack: stack.to_string(),
                source: other,
            },
        }
    }
}

/// Append monitor errors to a failure message.
pub(crate) fn suffix_with_errors(message: &str, errors: &[String]) -> String {
    if errors.is_empty() {
        message.to_string()
    } else {
        format!("{message}: {}", errors.join(", "))
    }
}
