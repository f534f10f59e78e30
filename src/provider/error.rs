// ABOUTME: Errors surfaced by the provisioning service transport.
// ABOUTME: Named variants for the conditions the orchestration logic reacts to.

/// Errors from remote provisioning calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error("Stack [{0}] does not exist")]
    StackNotFound(String),

    #[error("No updates are to be performed.")]
    NoUpdates,

    #[error("parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("change set not found: {0}")]
    ChangeSetNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("remote API error: {0}")]
    Api(String),
}
