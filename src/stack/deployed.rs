// ABOUTME: Snapshot of a stack as currently deployed.
// ABOUTME: Wraps the describe call and treats deleted stacks as absent.

use super::status::StackStatus;
use crate::provider::{ProvisionError, StackDescription, StackOps};
use crate::types::StackId;
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// The deployed state of a stack at lookup time.
#[derive(Debug, Clone)]
pub struct DeployedStack {
    stack_name: String,
    description: Option<StackDescription>,
}

impl DeployedStack {
    /// Look up a stack. Stacks in `DELETE_COMPLETE` count as absent.
    pub async fn lookup<S>(sdk: &S, stack_name: &str) -> Result<Self, ProvisionError>
    where
        S: StackOps + ?Sized,
    {
        let description = match sdk.describe_stack(stack_name).await {
            Ok(description) => description,
            Err(ProvisionError::StackNotFound(_)) => None,
            Err(e) => return Err(e),
        };
        let description = description.filter(|d| d.status != "DELETE_COMPLETE");
        Ok(Self {
            stack_name: stack_name.to_string(),
            description,
        })
    }

    pub fn does_not_exist(stack_name: &str) -> Self {
        Self {
            stack_name: stack_name.to_string(),
            description: None,
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    pub fn exists(&self) -> bool {
        self.description.is_some()
    }

    pub fn description(&self) -> Option<&StackDescription> {
        self.description.as_ref()
    }

    pub fn stack_id(&self) -> Option<&StackId> {
        self.description.as_ref().map(|d| &d.stack_id)
    }

    pub fn status(&self) -> StackStatus {
        match &self.description {
            Some(d) => StackStatus::new(d.status.clone(), d.status_reason.clone()),
            None => StackStatus::not_found(),
        }
    }

    /// Current parameter values; empty for a missing stack.
    pub fn parameters(&self) -> BTreeMap<String, String> {
        self.description
            .as_ref()
            .map(|d| d.parameters.clone())
            .unwrap_or_default()
    }

    pub fn outputs(&self) -> BTreeMap<String, String> {
        self.description
            .as_ref()
            .map(|d| d.outputs.clone())
            .unwrap_or_default()
    }

    pub fn tags(&self) -> BTreeMap<String, String> {
        self.description
            .as_ref()
            .map(|d| d.tags.clone())
            .unwrap_or_default()
    }

    pub fn termination_protection(&self) -> bool {
        self.description
            .as_ref()
            .is_some_and(|d| d.termination_protection)
    }

    /// The deployed template; an empty object for a missing stack.
    pub async fn template<S>(&self, sdk: &S) -> Result<Value, ProvisionError>
    where
        S: StackOps + ?Sized,
    {
        if !self.exists() {
            return Ok(json!({}));
        }
        sdk.get_template(&self.stack_name).await
    }
}
