// ABOUTME: In-memory provisioning service used by the integration tests.
// ABOUTME: Stacks settle into scripted statuses; every call is recorded for assertions.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use stackpilot::provider::{
    ApiParameter, ChangeSetDescription, ChangeSetType, ContinueUpdateRollbackInput,
    CreateChangeSetInput, CreateStackInput, ExecuteChangeSetInput, ImageRepositoryOps,
    ParameterStoreOps, ParameterValue, PolicyAction, ProvisionError, ResourceChangeSummary,
    ResourceIdentifierSummary, RollbackStackInput, StackDescription, StackEvent, StackEventsPage,
    StackOps, UpdateStackInput,
};
use stackpilot::types::{ChangeSetId, StackId};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

/// Calls that change remote state.
const MUTATING_CALLS: [&str; 10] = [
    "create_stack",
    "update_stack",
    "delete_stack",
    "create_change_set",
    "execute_change_set",
    "delete_change_set",
    "rollback_stack",
    "continue_update_rollback",
    "update_termination_protection",
    "create_repository",
];

#[derive(Debug, Clone)]
struct StackRecord {
    description: StackDescription,
    template: Value,
    /// Statuses reported by the next describe calls before the real one.
    pending: VecDeque<String>,
    /// Failure event emitted once a describe call reveals the settled status.
    pending_failure: Option<(String, String)>,
}

#[derive(Debug, Clone)]
struct ChangeSetRecord {
    description: ChangeSetDescription,
    change_set_type: ChangeSetType,
    template: Value,
    parameters: Vec<ApiParameter>,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct State {
    stacks: BTreeMap<String, StackRecord>,
    change_sets: HashMap<(String, String), ChangeSetRecord>,
    created_change_sets: Vec<(String, ChangeSetType)>,
    outcomes: HashMap<String, VecDeque<String>>,
    failing_resources: HashMap<String, (String, String)>,
    replacements: BTreeSet<String>,
    events: HashMap<String, Vec<StackEvent>>,
    parameters: HashMap<String, String>,
    repositories: BTreeMap<String, String>,
    summaries: Vec<ResourceIdentifierSummary>,
    skipped_resources: Vec<Vec<String>>,
    calls: Vec<String>,
    in_progress_polls: usize,
    next_id: u64,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Settle `stack` after a mutating call: a scripted outcome wins over `default`.
    fn settle(&mut self, stack: &str, in_progress: &str, default: &str) {
        let status = self
            .outcomes
            .get_mut(stack)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| default.to_string());
        let polls = self.in_progress_polls;
        let failing = self
            .failing_resources
            .get(stack)
            .cloned()
            .filter(|_| status.ends_with("FAILED") || status.ends_with("ROLLBACK_COMPLETE"));
        if let Some(record) = self.stacks.get_mut(stack) {
            record.description.status = status;
            record.pending = std::iter::repeat_n(in_progress.to_string(), polls).collect();
            record.pending_failure = failing;
        }
    }

    fn push_event(&mut self, stack: &str, logical_id: &str, status: &str, reason: Option<String>) {
        let id = self.next_id();
        let stack_id = self
            .stacks
            .get(stack)
            .map(|r| r.description.stack_id.to_string())
            .unwrap_or_else(|| stack_arn(stack));
        let event = StackEvent {
            event_id: format!("event-{id}"),
            stack_id,
            stack_name: stack.to_string(),
            logical_resource_id: Some(logical_id.to_string()),
            physical_resource_id: Some(format!("{logical_id}-physical")),
            resource_type: Some("AWS::SQS::Queue".to_string()),
            resource_status: Some(status.to_string()),
            resource_status_reason: reason,
            timestamp: Utc::now(),
        };
        // Newest first, like the service.
        self.events.entry(stack.to_string()).or_default().insert(0, event);
    }
}

/// `UPDATE_ROLLBACK_FAILED` -> `UPDATE`: the operation a failed resource was part of.
fn resource_verb(stack_status: &str) -> &str {
    stack_status.split('_').next().unwrap_or("UPDATE")
}

fn stack_arn(name: &str) -> String {
    format!("arn:aws:cloudformation:eu-west-1:123456789012:stack/{name}/0000")
}

/// In-memory provisioning service.
#[derive(Debug, Default)]
pub struct FakeSdk {
    state: Mutex<State>,
}

impl FakeSdk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an existing stack.
    pub fn with_stack(self, name: &str, status: &str, template: Value) -> Self {
        self.put_stack(name, status, template, BTreeMap::new());
        self
    }

    /// Add an existing stack with parameter values.
    pub fn with_stack_parameters(
        self,
        name: &str,
        status: &str,
        template: Value,
        parameters: &[(&str, &str)],
    ) -> Self {
        let parameters = parameters
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.put_stack(name, status, template, parameters);
        self
    }

    /// Add a bootstrap stack with the given version and a staging bucket.
    pub fn with_toolkit(self, name: &str, version: u32) -> Self {
        self.put_stack(name, "UPDATE_COMPLETE", Value::Null, BTreeMap::new());
        {
            let mut state = self.state.lock();
            if let Some(record) = state.stacks.get_mut(name) {
                record.description.outputs = BTreeMap::from([
                    ("BootstrapVersion".to_string(), version.to_string()),
                    ("BucketName".to_string(), "staging-bucket".to_string()),
                    (
                        "BucketDomainName".to_string(),
                        "staging-bucket.s3.amazonaws.com".to_string(),
                    ),
                    ("ImageRepositoryName".to_string(), "staging-repo".to_string()),
                ]);
            }
        }
        self
    }

    pub fn with_parameter(self, name: &str, value: &str) -> Self {
        self.state
            .lock()
            .parameters
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_identifier_summary(self, resource_type: &str, identifiers: &[&str]) -> Self {
        self.state.lock().summaries.push(ResourceIdentifierSummary {
            resource_type: resource_type.to_string(),
            logical_resource_ids: Vec::new(),
            resource_identifiers: identifiers.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    /// Statuses the stack settles into after each following mutating call.
    pub fn with_outcomes(self, stack: &str, statuses: &[&str]) -> Self {
        self.state.lock().outcomes.insert(
            stack.to_string(),
            statuses.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Emit a failure event for `logical_id` whenever the stack settles in a
    /// failed or rolled back status.
    pub fn with_failing_resource(self, stack: &str, logical_id: &str, reason: &str) -> Self {
        self.state.lock().failing_resources.insert(
            stack.to_string(),
            (logical_id.to_string(), reason.to_string()),
        );
        self
    }

    /// Changes to `logical_id` are reported as replacements.
    pub fn with_replacement(self, logical_id: &str) -> Self {
        self.state.lock().replacements.insert(logical_id.to_string());
        self
    }

    /// Number of in-progress statuses reported after each mutating call.
    pub fn with_in_progress_polls(self, polls: usize) -> Self {
        self.state.lock().in_progress_polls = polls;
        self
    }

    /// Record a stack event, newest first.
    pub fn push_event(&self, stack: &str, logical_id: &str, status: &str, reason: Option<&str>) {
        self.state
            .lock()
            .push_event(stack, logical_id, status, reason.map(str::to_string));
    }

    /// Record an event for a nested stack resource whose physical id is `child`.
    pub fn push_nested_stack_event(&self, stack: &str, logical_id: &str, child: &str, status: &str) {
        let mut state = self.state.lock();
        state.push_event(stack, logical_id, status, None);
        if let Some(event) = state.events.get_mut(stack).and_then(|events| events.first_mut()) {
            event.resource_type = Some("AWS::CloudFormation::Stack".to_string());
            event.physical_resource_id = Some(child.to_string());
        }
    }

    fn put_stack(
        &self,
        name: &str,
        status: &str,
        template: Value,
        parameters: BTreeMap<String, String>,
    ) {
        let record = StackRecord {
            description: StackDescription {
                stack_id: StackId::new(stack_arn(name)),
                stack_name: name.to_string(),
                status: status.to_string(),
                status_reason: None,
                parameters,
                outputs: BTreeMap::new(),
                tags: BTreeMap::new(),
                termination_protection: false,
                creation_time: Utc::now(),
            },
            template,
            pending: VecDeque::new(),
            pending_failure: None,
        };
        self.state.lock().stacks.insert(name.to_string(), record);
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.state.lock().calls.iter().filter(|c| *c == call).count()
    }

    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| MUTATING_CALLS.contains(&c.as_str()))
            .collect()
    }

    pub fn status(&self, stack: &str) -> Option<String> {
        self.state
            .lock()
            .stacks
            .get(stack)
            .map(|r| r.description.status.clone())
    }

    pub fn template(&self, stack: &str) -> Option<Value> {
        self.state.lock().stacks.get(stack).map(|r| r.template.clone())
    }

    pub fn stack_parameters(&self, stack: &str) -> BTreeMap<String, String> {
        self.state
            .lock()
            .stacks
            .get(stack)
            .map(|r| r.description.parameters.clone())
            .unwrap_or_default()
    }

    /// The last change set created for `stack`.
    /// The skip list of every continue-rollback call, in order.
    pub fn skipped_resources(&self) -> Vec<Vec<String>> {
        self.state.lock().skipped_resources.clone()
    }

    pub fn last_change_set_type(&self, stack: &str) -> Option<ChangeSetType> {
        let state = self.state.lock();
        state
            .created_change_sets
            .iter()
            .rev()
            .find(|(s, _)| s == stack)
            .map(|(_, t)| *t)
    }

    fn record(&self, call: &str) {
        self.state.lock().calls.push(call.to_string());
    }
}

fn apply_parameters(
    current: &BTreeMap<String, String>,
    parameters: &[ApiParameter],
) -> BTreeMap<String, String> {
    parameters
        .iter()
        .filter_map(|p| match &p.value {
            ParameterValue::Value(v) => Some((p.key.clone(), v.clone())),
            ParameterValue::UsePreviousValue => {
                current.get(&p.key).map(|v| (p.key.clone(), v.clone()))
            }
        })
        .collect()
}

fn resource_changes(
    current: &Value,
    desired: &Value,
    replacements: &BTreeSet<String>,
) -> Vec<ResourceChangeSummary> {
    let empty = serde_json::Map::new();
    let old = current
        .get("Resources")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let new = desired
        .get("Resources")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let ids: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    ids.into_iter()
        .filter_map(|id| {
            let action = match (old.get(id), new.get(id)) {
                (None, Some(_)) => "Add",
                (Some(_), None) => "Remove",
                (Some(a), Some(b)) if a != b => "Modify",
                _ => return None,
            };
            let resource_type = new
                .get(id)
                .or_else(|| old.get(id))
                .and_then(|r| r.get("Type"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Some(ResourceChangeSummary {
                logical_resource_id: id.clone(),
                resource_type,
                action: action.to_string(),
                policy_action: (action == "Modify" && replacements.contains(id))
                    .then_some(PolicyAction::ReplaceAndDelete),
            })
        })
        .collect()
}

#[async_trait]
impl StackOps for FakeSdk {
    async fn describe_stack(&self, name: &str) -> Result<Option<StackDescription>, ProvisionError> {
        self.record("describe_stack");
        let mut state = self.state.lock();
        let Some(record) = state.stacks.get_mut(name) else {
            return Ok(None);
        };
        let mut description = record.description.clone();
        if let Some(status) = record.pending.pop_front() {
            description.status = status;
            return Ok(Some(description));
        }
        if let Some((logical_id, reason)) = record.pending_failure.take() {
            let status = format!("{}_FAILED", resource_verb(&description.status));
            state.push_event(name, &logical_id, &status, Some(reason));
        }
        Ok(Some(description))
    }

    async fn get_template(&self, name: &str) -> Result<Value, ProvisionError> {
        self.record("get_template");
        self.state
            .lock()
            .stacks
            .get(name)
            .map(|r| r.template.clone())
            .ok_or_else(|| ProvisionError::StackNotFound(name.to_string()))
    }

    async fn create_stack(&self, input: &CreateStackInput) -> Result<StackId, ProvisionError> {
        self.record("create_stack");
        let submission = &input.submission;
        self.put_stack(
            &submission.stack_name,
            "CREATE_IN_PROGRESS",
            submission.template.clone(),
            apply_parameters(&BTreeMap::new(), &submission.parameters),
        );
        let mut state = self.state.lock();
        if let Some(record) = state.stacks.get_mut(&submission.stack_name) {
            record.description.tags = submission.tags.clone();
            record.description.termination_protection = input.termination_protection;
        }
        state.settle(&submission.stack_name, "CREATE_IN_PROGRESS", "CREATE_COMPLETE");
        Ok(StackId::new(stack_arn(&submission.stack_name)))
    }

    async fn update_stack(&self, input: &UpdateStackInput) -> Result<StackId, ProvisionError> {
        self.record("update_stack");
        let submission = &input.submission;
        let mut state = self.state.lock();
        let record = state
            .stacks
            .get_mut(&submission.stack_name)
            .ok_or_else(|| ProvisionError::StackNotFound(submission.stack_name.clone()))?;
        let parameters = apply_parameters(&record.description.parameters, &submission.parameters);
        if record.template == submission.template
            && record.description.parameters == parameters
            && record.description.tags == submission.tags
        {
            return Err(ProvisionError::NoUpdates);
        }
        record.template = submission.template.clone();
        record.description.parameters = parameters;
        record.description.tags = submission.tags.clone();
        state.settle(&submission.stack_name, "UPDATE_IN_PROGRESS", "UPDATE_COMPLETE");
        Ok(StackId::new(stack_arn(&submission.stack_name)))
    }

    async fn delete_stack(&self, stack: &str, _role_arn: Option<&str>) -> Result<(), ProvisionError> {
        self.record("delete_stack");
        self.state.lock().stacks.remove(stack);
        Ok(())
    }

    async fn create_change_set(
        &self,
        input: &CreateChangeSetInput,
    ) -> Result<ChangeSetId, ProvisionError> {
        self.record("create_change_set");
        let submission = &input.submission;
        let name = submission.stack_name.clone();
        if input.change_set_type == ChangeSetType::Create {
            self.put_stack(&name, "REVIEW_IN_PROGRESS", Value::Null, BTreeMap::new());
        }

        let mut state = self.state.lock();
        let id = state.next_id();
        let (current_template, current_parameters, current_tags) = state
            .stacks
            .get(&name)
            .map(|r| {
                (
                    r.template.clone(),
                    r.description.parameters.clone(),
                    r.description.tags.clone(),
                )
            })
            .unwrap_or_default();

        let changes = if input.change_set_type == ChangeSetType::Import {
            input
                .resources_to_import
                .iter()
                .map(|r| ResourceChangeSummary {
                    logical_resource_id: r.logical_resource_id.clone(),
                    resource_type: r.resource_type.clone(),
                    action: "Import".to_string(),
                    policy_action: None,
                })
                .collect()
        } else {
            resource_changes(&current_template, &submission.template, &state.replacements)
        };
        let parameters_changed =
            apply_parameters(&current_parameters, &submission.parameters) != current_parameters;
        let tags_changed = submission.tags != current_tags;
        let (status, reason) = if changes.is_empty() && !parameters_changed && !tags_changed {
            (
                "FAILED".to_string(),
                Some("The submitted information didn't contain changes. Submit different information to create a change set.".to_string()),
            )
        } else {
            ("CREATE_COMPLETE".to_string(), None)
        };

        let change_set_id = ChangeSetId::new(format!("arn:changeSet/{}/{id}", input.change_set_name));
        let record = ChangeSetRecord {
            description: ChangeSetDescription {
                change_set_id: change_set_id.clone(),
                stack_id: StackId::new(stack_arn(&name)),
                status,
                status_reason: reason,
                changes,
                creation_time: Utc::now(),
            },
            change_set_type: input.change_set_type,
            template: submission.template.clone(),
            parameters: submission.parameters.clone(),
            tags: submission.tags.clone(),
        };
        state
            .created_change_sets
            .push((name.clone(), input.change_set_type));
        state
            .change_sets
            .insert((name, input.change_set_name.clone()), record);
        Ok(change_set_id)
    }

    async fn describe_change_set(
        &self,
        stack: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ProvisionError> {
        self.record("describe_change_set");
        self.state
            .lock()
            .change_sets
            .get(&(stack.to_string(), change_set_name.to_string()))
            .map(|r| r.description.clone())
            .ok_or_else(|| ProvisionError::ChangeSetNotFound(change_set_name.to_string()))
    }

    async fn execute_change_set(&self, input: &ExecuteChangeSetInput) -> Result<(), ProvisionError> {
        self.record("execute_change_set");
        let mut state = self.state.lock();
        let key = (input.stack_name.clone(), input.change_set_name.clone());
        let change_set = state
            .change_sets
            .remove(&key)
            .ok_or_else(|| ProvisionError::ChangeSetNotFound(input.change_set_name.clone()))?;
        let record = state
            .stacks
            .get_mut(&input.stack_name)
            .ok_or_else(|| ProvisionError::StackNotFound(input.stack_name.clone()))?;
        record.template = change_set.template;
        record.description.parameters =
            apply_parameters(&record.description.parameters, &change_set.parameters);
        record.description.tags = change_set.tags;
        let (in_progress, complete) = match change_set.change_set_type {
            ChangeSetType::Create => ("CREATE_IN_PROGRESS", "CREATE_COMPLETE"),
            ChangeSetType::Update => ("UPDATE_IN_PROGRESS", "UPDATE_COMPLETE"),
            ChangeSetType::Import => ("IMPORT_IN_PROGRESS", "IMPORT_COMPLETE"),
        };
        state.settle(&input.stack_name, in_progress, complete);
        Ok(())
    }

    async fn delete_change_set(
        &self,
        stack: &str,
        change_set_name: &str,
    ) -> Result<(), ProvisionError> {
        self.record("delete_change_set");
        self.state
            .lock()
            .change_sets
            .remove(&(stack.to_string(), change_set_name.to_string()));
        Ok(())
    }

    async fn rollback_stack(&self, input: &RollbackStackInput) -> Result<(), ProvisionError> {
        self.record("rollback_stack");
        let mut state = self.state.lock();
        let was_create = state
            .stacks
            .get(&input.stack_name)
            .is_some_and(|r| r.description.status == "CREATE_FAILED");
        let (in_progress, complete) = if was_create {
            ("ROLLBACK_IN_PROGRESS", "ROLLBACK_COMPLETE")
        } else {
            ("UPDATE_ROLLBACK_IN_PROGRESS", "UPDATE_ROLLBACK_COMPLETE")
        };
        state.settle(&input.stack_name, in_progress, complete);
        Ok(())
    }

    async fn continue_update_rollback(
        &self,
        input: &ContinueUpdateRollbackInput,
    ) -> Result<(), ProvisionError> {
        self.record("continue_update_rollback");
        let mut state = self.state.lock();
        state.skipped_resources.push(input.resources_to_skip.clone());
        state.settle(
            &input.stack_name,
            "UPDATE_ROLLBACK_IN_PROGRESS",
            "UPDATE_ROLLBACK_COMPLETE",
        );
        Ok(())
    }

    async fn describe_stack_events(
        &self,
        stack: &str,
        _next_token: Option<&str>,
    ) -> Result<StackEventsPage, ProvisionError> {
        self.record("describe_stack_events");
        Ok(StackEventsPage {
            events: self
                .state
                .lock()
                .events
                .get(stack)
                .cloned()
                .unwrap_or_default(),
            next_token: None,
        })
    }

    async fn get_template_summary(
        &self,
        _template: &Value,
    ) -> Result<Vec<ResourceIdentifierSummary>, ProvisionError> {
        self.record("get_template_summary");
        Ok(self.state.lock().summaries.clone())
    }

    async fn update_termination_protection(
        &self,
        stack: &str,
        enabled: bool,
    ) -> Result<(), ProvisionError> {
        self.record("update_termination_protection");
        if let Some(record) = self.state.lock().stacks.get_mut(stack) {
            record.description.termination_protection = enabled;
        }
        Ok(())
    }
}

#[async_trait]
impl ParameterStoreOps for FakeSdk {
    async fn get_parameter(&self, name: &str) -> Result<String, ProvisionError> {
        self.record("get_parameter");
        self.state
            .lock()
            .parameters
            .get(name)
            .cloned()
            .ok_or_else(|| ProvisionError::ParameterNotFound(name.to_string()))
    }
}

#[async_trait]
impl ImageRepositoryOps for FakeSdk {
    async fn describe_repository(&self, name: &str) -> Result<Option<String>, ProvisionError> {
        self.record("describe_repository");
        Ok(self.state.lock().repositories.get(name).cloned())
    }

    async fn create_repository(
        &self,
        name: &str,
        _tags: &BTreeMap<String, String>,
    ) -> Result<Option<String>, ProvisionError> {
        self.record("create_repository");
        let uri = format!("123456789012.dkr.ecr.eu-west-1.amazonaws.com/{name}");
        self.state
            .lock()
            .repositories
            .insert(name.to_string(), uri.clone());
        Ok(Some(uri))
    }

    async fn enable_scan_on_push(&self, _name: &str) -> Result<(), ProvisionError> {
        self.record("enable_scan_on_push");
        Ok(())
    }
}
