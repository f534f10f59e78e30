// ABOUTME: Environment access error types with SNAFU pattern.
// ABOUTME: Account resolution, credential, bootstrap version and cache failures.

use snafu::Snafu;

use super::account_cache::AccountCacheError;
use crate::provider::ProvisionError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum EnvironmentError {
    #[snafu(display(
        "Unable to resolve the account to use. It must be set on the stack or available from the default credentials"
    ))]
    UnresolvedAccount,

    #[snafu(display("could not obtain credentials for {environment}: {source}"))]
    SdkAccess {
        environment: String,
        source: ProvisionError,
    },

    #[snafu(display("{source}"))]
    Remote { source: ProvisionError },

    #[snafu(display(
        "This deployment requires bootstrap stack version '{required}', found '{found}'. Please re-bootstrap the environment."
    ))]
    BootstrapVersionTooOld { required: u32, found: u32 },

    #[snafu(display(
        "Bootstrap stack version '{required}' is required, found version '{found}'. To get rid of this error, please upgrade to bootstrap version >= {required}"
    ))]
    LookupRoleVersionTooOld { required: u32, found: u32 },

    #[snafu(display(
        "SSM parameter {parameter} not found. Has the environment been bootstrapped?"
    ))]
    VersionParameterNotFound { parameter: String },

    #[snafu(display("SSM parameter {parameter} not a number: {value}"))]
    VersionParameterNotNumber { parameter: String, value: String },

    #[snafu(display(
        "This deployment requires bootstrap stack version '{required}', but during the confirmation via SSM parameter {parameter} the following error occurred: {source}"
    ))]
    VersionParameterUnreadable {
        parameter: String,
        required: u32,
        source: ProvisionError,
    },

    #[snafu(display(
        "bootstrap stack {stack_name} not found in {environment}; bootstrap the environment first"
    ))]
    BootstrapStackNotFound {
        stack_name: String,
        environment: String,
    },

    #[snafu(display("CreateRepository did not return a repository URI for {repository}"))]
    RepositoryUriMissing { repository: String },

    #[snafu(display("account cache failure: {source}"))]
    Cache { source: AccountCacheError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentErrorKind {
    /// No account could be determined.
    UnresolvedAccount,
    /// Credentials or role assumption failed.
    Credentials,
    /// The bootstrap stack is too old or missing its version.
    BootstrapVersion,
    /// No bootstrap stack in the environment.
    BootstrapMissing,
    /// A remote call failed.
    Remote,
    /// The account cache file could not be used.
    Cache,
}

impl EnvironmentError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> EnvironmentErrorKind {
        match self {
            EnvironmentError::UnresolvedAccount => EnvironmentErrorKind::UnresolvedAccount,
            EnvironmentError::SdkAccess { .. } => EnvironmentErrorKind::Credentials,
            EnvironmentError::Remote { .. } | EnvironmentError::RepositoryUriMissing { .. } => {
                EnvironmentErrorKind::Remote
            }
            EnvironmentError::BootstrapVersionTooOld { .. }
            | EnvironmentError::LookupRoleVersionTooOld { .. }
            | EnvironmentError::VersionParameterNotFound { .. }
            | EnvironmentError::VersionParameterNotNumber { .. }
            | EnvironmentError::VersionParameterUnreadable { .. } => {
                EnvironmentErrorKind::BootstrapVersion
            }
            EnvironmentError::BootstrapStackNotFound { .. } => EnvironmentErrorKind::BootstrapMissing,
            EnvironmentError::Cache { .. } => EnvironmentErrorKind::Cache,
        }
    }
}

impl From<ProvisionError> for EnvironmentError {
    fn from(source: ProvisionError) -> Self {
        EnvironmentError::Remote { source }
    }
}

impl From<AccountCacheError> for EnvironmentError {
    fn from(source: AccountCacheError) -> Self {
        EnvironmentError::Cache { source }
    }
}
