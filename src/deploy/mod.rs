// ABOUTME: Stack deployment orchestration using the type state pattern.
// ABOUTME: Exports the deployment state machine, rollback, destroy and per-stack locking.

mod deployment;
mod destroy;
mod error;
mod hotswap;
mod lock;
mod options;
mod parameters;
mod result;
mod rollback;
mod stabilize;
mod state;
mod transitions;

pub use deployment::StackDeployment;
pub use destroy::destroy_stack;
pub use error::{DeployError, DeployErrorKind};
pub use hotswap::{HotswapOutcome, Hotswapper, NoHotswap};
pub use lock::{LockInfo, StackLockGuard, StackLocks, StackOperation};
pub use options::{
    DEFAULT_CHANGE_SET_NAME, DeployStackOptions, DeploymentMethod, DestroyStackOptions,
    HotswapMode, RollbackStackOptions,
};
pub use parameters::{
    ParameterChanges, ParameterError, ParameterSource, ResolvedParameter, ResolvedParameters,
    SKIP_INVALIDATE_MARKER, TemplateParameter, TemplateParameters,
};
pub use result::{DeployStackResult, RollbackReason, RollbackStackResult};
pub use rollback::{BOOTSTRAP_VERSION_FOR_ROLLBACK, rollback_stack};
pub use stabilize::DeployContext;
pub use state::{BootstrapValidated, Initialized, Prepared, Submitted};
pub use transitions::{PrepareOutcome, SubmitOutcome, TransitionResult};
