// ABOUTME: Stack operations trait for the provisioning service.
// ABOUTME: Describe, create, update, delete, change sets, rollback and event history.

use super::error::ProvisionError;
use super::shared_types::{
    ChangeSetDescription, ContinueUpdateRollbackInput, CreateChangeSetInput, CreateStackInput,
    ExecuteChangeSetInput, ResourceIdentifierSummary, RollbackStackInput, StackDescription,
    StackEventsPage, UpdateStackInput,
};
use crate::types::{ChangeSetId, StackId};
use async_trait::async_trait;
use serde_json::Value;

/// Stack lifecycle operations.
#[async_trait]
pub trait StackOps: Send + Sync {
    /// Describe a stack by name or ARN. `None` when the stack does not exist.
    async fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>, ProvisionError>;

    /// Fetch the currently deployed template body.
    async fn get_template(&self, name: &str) -> Result<Value, ProvisionError>;

    /// Create a stack directly.
    async fn create_stack(&self, input: &CreateStackInput) -> Result<StackId, ProvisionError>;

    /// Update a stack directly. Returns `ProvisionError::NoUpdates` when nothing changes.
    async fn update_stack(&self, input: &UpdateStackInput) -> Result<StackId, ProvisionError>;

    /// Delete a stack.
    async fn delete_stack(
        &self,
        stack: &str,
        role_arn: Option<&str>,
    ) -> Result<(), ProvisionError>;

    /// Create a change set.
    async fn create_change_set(
        &self,
        input: &CreateChangeSetInput,
    ) -> Result<ChangeSetId, ProvisionError>;

    /// Describe a change set, including its resource changes.
    async fn describe_change_set(
        &self,
        stack: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ProvisionError>;

    /// Execute a created change set.
    async fn execute_change_set(&self, input: &ExecuteChangeSetInput)
    -> Result<(), ProvisionError>;

    /// Delete a change set.
    async fn delete_change_set(
        &self,
        stack: &str,
        change_set_name: &str,
    ) -> Result<(), ProvisionError>;

    /// Start rolling back a stack paused in a failed state.
    async fn rollback_stack(&self, input: &RollbackStackInput) -> Result<(), ProvisionError>;

    /// Continue a failed update rollback, optionally skipping resources.
    async fn continue_update_rollback(
        &self,
        input: &ContinueUpdateRollbackInput,
    ) -> Result<(), ProvisionError>;

    /// One page of stack events, newest first.
    async fn describe_stack_events(
        &self,
        stack: &str,
        next_token: Option<&str>,
    ) -> Result<StackEventsPage, ProvisionError>;

    /// Template introspection: identifier properties per resource type.
    async fn get_template_summary(
        &self,
        template: &Value,
    ) -> Result<Vec<ResourceIdentifierSummary>, ProvisionError>;

    /// Toggle termination protection on an existing stack.
    async fn update_termination_protection(
        &self,
        stack: &str,
        enabled: bool,
    ) -> Result<(), ProvisionError>;
}
