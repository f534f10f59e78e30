// ABOUTME: Shared request and response types used across provider trait definitions.
// ABOUTME: Stack descriptions, change sets, events, parameters and import identifiers.

use crate::types::{ChangeSetId, StackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A deployed stack as reported by the provisioning service.
#[derive(Debug, Clone, PartialEq)]
pub struct StackDescription {
    pub stack_id: StackId,
    pub stack_name: String,
    /// Raw status name, e.g. `UPDATE_ROLLBACK_FAILED`.
    pub status: String,
    pub status_reason: Option<String>,
    /// Current parameter values (resolved values for store-backed parameters).
    pub parameters: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
    pub termination_protection: bool,
    pub creation_time: DateTime<Utc>,
}

/// Value of a parameter in an outgoing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterValue {
    Value(String),
    UsePreviousValue,
}

/// A parameter in an outgoing create/update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiParameter {
    pub key: String,
    pub value: ParameterValue,
}

impl ApiParameter {
    pub fn value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ParameterValue::Value(value.into()),
        }
    }

    pub fn use_previous(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ParameterValue::UsePreviousValue,
        }
    }
}

/// Fields shared by every template submission.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateSubmission {
    pub stack_name: String,
    pub template: Value,
    pub parameters: Vec<ApiParameter>,
    pub role_arn: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub capabilities: Vec<String>,
}

/// Direct stack creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateStackInput {
    pub submission: TemplateSubmission,
    pub client_request_token: String,
    pub termination_protection: bool,
    pub disable_rollback: bool,
}

/// Direct stack update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStackInput {
    pub submission: TemplateSubmission,
    pub client_request_token: String,
    pub disable_rollback: bool,
}

/// The kind of change set to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeSetType {
    Create,
    Update,
    Import,
}

/// A resource to bind during an import change set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceToImport {
    pub logical_resource_id: String,
    pub resource_type: String,
    pub resource_identifier: BTreeMap<String, String>,
}

/// Change set creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateChangeSetInput {
    pub submission: TemplateSubmission,
    pub change_set_name: String,
    pub change_set_type: ChangeSetType,
    pub resources_to_import: Vec<ResourceToImport>,
    pub import_existing_resources: bool,
    pub description: String,
    pub client_token: String,
}

/// What the service will do to the previous physical resource on replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    Delete,
    Retain,
    Snapshot,
    ReplaceAndDelete,
    ReplaceAndRetain,
    ReplaceAndSnapshot,
}

impl PolicyAction {
    pub fn is_replacement(self) -> bool {
        matches!(
            self,
            PolicyAction::ReplaceAndDelete
                | PolicyAction::ReplaceAndRetain
                | PolicyAction::ReplaceAndSnapshot
        )
    }
}

/// One resource change inside a change set.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceChangeSummary {
    pub logical_resource_id: String,
    pub resource_type: String,
    pub action: String,
    pub policy_action: Option<PolicyAction>,
}

/// A change set as reported by the provisioning service.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSetDescription {
    pub change_set_id: ChangeSetId,
    pub stack_id: StackId,
    /// e.g. `CREATE_PENDING`, `CREATE_COMPLETE`, `FAILED`.
    pub status: String,
    pub status_reason: Option<String>,
    pub changes: Vec<ResourceChangeSummary>,
    pub creation_time: DateTime<Utc>,
}

impl ChangeSetDescription {
    /// Whether any change replaces a physical resource.
    pub fn has_replacement(&self) -> bool {
        self.changes
            .iter()
            .any(|c| c.policy_action.is_some_and(PolicyAction::is_replacement))
    }

    /// Whether the service refused the change set because nothing would change.
    pub fn has_no_changes(&self) -> bool {
        const NO_CHANGE_PREFIXES: [&str; 2] = [
            "The submitted information didn't contain changes.",
            // Reported instead when a template transform is involved.
            "No updates are to be performed.",
        ];
        let reason = self.status_reason.as_deref().unwrap_or_default();
        self.status == "FAILED" && NO_CHANGE_PREFIXES.iter().any(|p| reason.starts_with(p))
    }
}

/// Change set execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteChangeSetInput {
    pub stack_name: String,
    pub change_set_name: String,
    pub client_request_token: String,
    pub disable_rollback: bool,
}

/// Start of a rollback for a stack paused in a failed state.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackStackInput {
    pub stack_name: String,
    pub role_arn: Option<String>,
    pub client_request_token: String,
    /// Keep resources the failed operation created rather than deleting them.
    pub retain_except_on_create: bool,
}

/// Continuation of a failed update rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinueUpdateRollbackInput {
    pub stack_name: String,
    pub role_arn: Option<String>,
    pub client_request_token: String,
    pub resources_to_skip: Vec<String>,
}

/// A single entry in a stack's event history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackEvent {
    pub event_id: String,
    pub stack_id: String,
    pub stack_name: String,
    pub logical_resource_id: Option<String>,
    pub physical_resource_id: Option<String>,
    pub resource_type: Option<String>,
    pub resource_status: Option<String>,
    pub resource_status_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A page of stack events, newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackEventsPage {
    pub events: Vec<StackEvent>,
    pub next_token: Option<String>,
}

/// Identifier properties for one resource type in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceIdentifierSummary {
    pub resource_type: String,
    pub logical_resource_ids: Vec<String>,
    pub resource_identifiers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change_set(status: &str, reason: Option<&str>) -> ChangeSetDescription {
        ChangeSetDescription {
            change_set_id: ChangeSetId::new("cs"),
            stack_id: StackId::new("stack"),
            status: status.to_string(),
            status_reason: reason.map(str::to_string),
            changes: vec![],
            creation_time: Utc::now(),
        }
    }

    #[test]
    fn failed_change_set_without_changes_is_detected() {
        let cs = change_set(
            "FAILED",
            Some("The submitted information didn't contain changes. Submit different information."),
        );
        assert!(cs.has_no_changes());
    }

    #[test]
    fn transform_no_update_message_is_detected() {
        let cs = change_set("FAILED", Some("No updates are to be performed."));
        assert!(cs.has_no_changes());
    }

    #[test]
    fn other_failures_are_not_no_change() {
        let cs = change_set("FAILED", Some("Template format error"));
        assert!(!cs.has_no_changes());
        assert!(!change_set("CREATE_COMPLETE", None).has_no_changes());
    }

    #[test]
    fn replacement_detection_uses_policy_action() {
        let mut cs = change_set("CREATE_COMPLETE", None);
        cs.changes.push(ResourceChangeSummary {
            logical_resource_id: "Queue".to_string(),
            resource_type: "AWS::SQS::Queue".to_string(),
            action: "Modify".to_string(),
            policy_action: Some(PolicyAction::Retain),
        });
        assert!(!cs.has_replacement());

        cs.changes[0].policy_action = Some(PolicyAction::ReplaceAndDelete);
        assert!(cs.has_replacement());
    }
}
