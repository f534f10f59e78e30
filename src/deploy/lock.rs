// ABOUTME: Per-stack operation lock preventing concurrent lifecycle operations.
// ABOUTME: Lock info records which operation holds a stack and since when.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::DeployError;

/// Lifecycle operation holding a stack lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StackOperation {
    Deploy,
    Rollback,
    Destroy,
    Import,
}

impl fmt::Display for StackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StackOperation::Deploy => "deploy",
            StackOperation::Rollback => "rollback",
            StackOperation::Destroy => "destroy",
            StackOperation::Import => "import",
        };
        f.write_str(name)
    }
}

/// Information about who holds a stack lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Stack being operated on.
    pub stack: String,
    /// Operation holding the lock.
    pub operation: StackOperation,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
}

impl LockInfo {
    fn new(stack: &str, operation: StackOperation) -> Self {
        Self {
            stack: stack.to_string(),
            operation,
            started_at: Utc::now(),
        }
    }
}

/// Registry of held stack locks, shared by one coordinator.
#[derive(Debug, Default, Clone)]
pub struct StackLocks {
    held: Arc<Mutex<HashMap<String, LockInfo>>>,
}

impl StackLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a stack.
    ///
    /// Fails with `DeployError::StackBusy` when another operation already
    /// holds it. The lock is released when the guard drops.
    pub fn acquire(
        &self,
        stack: &str,
        operation: StackOperation,
    ) -> Result<StackLockGuard, DeployError> {
        let mut held = self.held.lock();
        if let Some(existing) = held.get(stack) {
            return Err(DeployError::StackBusy {
                stack: stack.to_string(),
                info: existing.clone(),
            });
        }
        held.insert(stack.to_string(), LockInfo::new(stack, operation));
        tracing::debug!(stack, %operation, "acquired stack lock");
        Ok(StackLockGuard {
            held: Arc::clone(&self.held),
            stack: stack.to_string(),
        })
    }

    /// Current holder of a stack lock, if any.
    pub fn holder(&self, stack: &str) -> Option<LockInfo> {
        self.held.lock().get(stack).cloned()
    }
}

/// A held stack lock that releases on drop.
pub struct StackLockGuard {
    held: Arc<Mutex<HashMap<String, LockInfo>>>,
    stack: String,
}

impl fmt::Debug for StackLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackLockGuard")
            .field("stack", &self.stack)
            .finish()
    }
}

impl Drop for StackLockGuard {
    fn drop(&mut self) {
        self.held.lock().remove(&self.stack);
        tracing::debug!(stack = %self.stack, "released stack lock");
    }
}
