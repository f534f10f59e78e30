// ABOUTME: Outcomes of deploy and rollback operations.
// ABOUTME: Paused-failure outcomes tell the caller a rollback is needed first.

use std::collections::BTreeMap;
use std::fmt;

use crate::types::StackId;

/// Why a stack paused in a failed state must be rolled back before deploying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackReason {
    /// The change replaces resources, which cannot be done without rollback.
    Replacement,
    /// The deployment asks for rollback, which a paused stack cannot honour.
    NotNoRollback,
}

impl fmt::Display for RollbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackReason::Replacement => f.write_str("replacement"),
            RollbackReason::NotNoRollback => f.write_str("not-norollback"),
        }
    }
}

/// Result of deploying one stack.
#[derive(Debug, Clone, PartialEq)]
pub enum DeployStackResult {
    /// The deployment completed or was unnecessary.
    Successful {
        no_op: bool,
        outputs: BTreeMap<String, String>,
        stack_arn: Option<StackId>,
    },
    /// The stack is paused in a failed state and must be rolled back first.
    NeedsRollbackFirst {
        reason: RollbackReason,
        status: String,
    },
    /// The change contains a replacement, which requires rollback to be enabled.
    ReplacementRequiresRollback,
}

impl DeployStackResult {
    pub(crate) fn no_op(outputs: BTreeMap<String, String>, stack_arn: Option<StackId>) -> Self {
        DeployStackResult::Successful {
            no_op: true,
            outputs,
            stack_arn,
        }
    }

    pub(crate) fn deployed(outputs: BTreeMap<String, String>, stack_arn: Option<StackId>) -> Self {
        DeployStackResult::Successful {
            no_op: false,
            outputs,
            stack_arn,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self, DeployStackResult::Successful { .. })
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self, DeployStackResult::Successful { no_op: true, .. })
    }

    pub fn outputs(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            DeployStackResult::Successful { outputs, .. } => Some(outputs),
            _ => None,
        }
    }
}

/// Result of rolling back one stack.
#[derive(Debug, Clone, PartialEq)]
pub enum RollbackStackResult {
    Success { stack_arn: Option<StackId> },
    /// The stack had nothing to roll back, or cannot be rolled back.
    /// `stack_arn` is absent when the stack does not exist.
    NotInRollbackableState { stack_arn: Option<StackId> },
}

impl RollbackStackResult {
    pub fn stack_arn(&self) -> Option<&StackId> {
        match self {
            RollbackStackResult::Success { stack_arn }
            | RollbackStackResult::NotInRollbackableState { stack_arn } => stack_arn.as_ref(),
        }
    }
}
