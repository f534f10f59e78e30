// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: State types carry the data gathered so far so later steps cannot run early.

use chrono::{DateTime, Utc};

use super::parameters::ResolvedParameters;
use crate::stack::DeployedStack;
use crate::types::StackId;

/// Initial state: options checked locally, nothing remote has happened.
/// Available actions: `validate_bootstrap()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Initialized;

/// Bootstrap stack version satisfies the stack's requirement.
/// Available actions: `prepare()`
#[derive(Debug, Clone, Copy, Default)]
pub struct BootstrapValidated;

/// Deployed stack inspected and parameters resolved.
/// Available actions: `submit()`, `try_hotswap()`
#[derive(Debug, Clone)]
pub struct Prepared {
    pub(crate) deployed: DeployedStack,
    pub(crate) parameters: ResolvedParameters,
}

impl Prepared {
    pub fn deployed(&self) -> &DeployedStack {
        &self.deployed
    }

    pub fn parameters(&self) -> &ResolvedParameters {
        &self.parameters
    }
}

/// Template submitted; the service is working on it.
/// Available actions: `stabilize()`
#[derive(Debug, Clone)]
pub struct Submitted {
    pub(crate) deployed: DeployedStack,
    pub(crate) stack_id: StackId,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) resources_total: Option<usize>,
}

impl Submitted {
    /// The ARN the service answered the submission with.
    pub fn stack_id(&self) -> &StackId {
        &self.stack_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }
}
