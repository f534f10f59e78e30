// ABOUTME: Incremental reader of a stack's event history, including nested stacks.
// ABOUTME: Each poll returns only events not seen before, oldest first.

use crate::provider::{ProvisionError, StackEvent, StackOps};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

const NESTED_STACK_TYPE: &str = "AWS::CloudFormation::Stack";

/// Where a poller starts and stops reading.
#[derive(Debug, Clone, Default)]
pub struct PollerOptions {
    /// Ignore events older than this.
    pub start_time: Option<DateTime<Utc>>,
    /// Logical ids of the stacks enclosing this one, outermost first.
    pub parent_stack_logical_ids: Vec<String>,
    /// Stop reading at a stack-level event with one of these statuses.
    pub stack_statuses: Vec<String>,
}

/// An event together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    pub event: StackEvent,
    pub parent_stack_logical_ids: Vec<String>,
    /// The event is about the polled stack itself, not one of its resources.
    pub is_stack_event: bool,
}

/// A failed resource seen by the poller.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceError {
    pub event: StackEvent,
    pub parent_stack_logical_ids: Vec<String>,
}

/// Reads stack events incrementally.
pub struct StackEventPoller<S> {
    sdk: Arc<S>,
    stack_name: String,
    options: PollerOptions,
    events: Vec<ResourceEvent>,
    seen: HashSet<String>,
    nested: BTreeMap<String, StackEventPoller<S>>,
    complete: bool,
}

impl<S> StackEventPoller<S>
where
    S: StackOps + 'static,
{
    pub fn new(sdk: Arc<S>, stack_name: impl Into<String>, options: PollerOptions) -> Self {
        Self {
            sdk,
            stack_name: stack_name.into(),
            options,
            events: Vec::new(),
            seen: HashSet::new(),
            nested: BTreeMap::new(),
            complete: false,
        }
    }

    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// Every event returned so far.
    pub fn events(&self) -> &[ResourceEvent] {
        &self.events
    }

    /// A terminal stack-level event has been seen.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Failed resources among the events seen so far.
    pub fn resource_errors(&self) -> Vec<ResourceError> {
        self.events
            .iter()
            .filter(|e| {
                !e.is_stack_event
                    && e.event
                        .resource_status
                        .as_deref()
                        .is_some_and(|s| s.ends_with("_FAILED"))
            })
            .map(|e| ResourceError {
                event: e.event.clone(),
                parent_stack_logical_ids: e.parent_stack_logical_ids.clone(),
            })
            .collect()
    }

    /// Read new events from this stack and every nested stack being tracked.
    pub fn poll(&mut self) -> BoxFuture<'_, Result<Vec<ResourceEvent>, ProvisionError>> {
        Box::pin(async move {
            let mut events = self.read_own_events().await?;

            let mut finished = Vec::new();
            for (logical_id, child) in self.nested.iter_mut() {
                events.extend(child.poll().await?);
                if child.is_complete() {
                    finished.push(logical_id.clone());
                }
            }
            for logical_id in finished {
                self.nested.remove(&logical_id);
            }

            events.sort_by_key(|e| e.event.timestamp);
            self.events.extend(events.iter().cloned());
            Ok(events)
        })
    }

    async fn read_own_events(&mut self) -> Result<Vec<ResourceEvent>, ProvisionError> {
        let mut events = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = match self
                .sdk
                .describe_stack_events(&self.stack_name, next_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) if self.is_missing_stack(&e) => return Ok(events),
                Err(e) => return Err(e),
            };

            for event in page.events {
                if self
                    .options
                    .start_time
                    .is_some_and(|start| event.timestamp < start)
                {
                    return Ok(events);
                }

                if !self.seen.insert(event.event_id.clone()) {
                    return Ok(events);
                }

                let is_stack_event =
                    event.physical_resource_id.as_deref() == Some(event.stack_id.as_str());
                let status = event.resource_status.clone().unwrap_or_default();

                if is_stack_event && self.options.stack_statuses.contains(&status) {
                    return Ok(events);
                }

                if !is_stack_event
                    && event.resource_type.as_deref() == Some(NESTED_STACK_TYPE)
                    && is_begin_operation(&status)
                {
                    self.track_nested_stack(&event);
                }

                if is_stack_event && !status.ends_with("_IN_PROGRESS") {
                    self.complete = true;
                }

                events.push(ResourceEvent {
                    event,
                    parent_stack_logical_ids: self.options.parent_stack_logical_ids.clone(),
                    is_stack_event,
                });
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => return Ok(events),
            }
        }
    }

    fn track_nested_stack(&mut self, event: &StackEvent) {
        // The first CREATE_IN_PROGRESS of a nested stack carries no physical id yet.
        let (Some(logical_id), Some(physical_id)) = (
            event.logical_resource_id.as_deref(),
            event.physical_resource_id.as_deref(),
        ) else {
            return;
        };
        if physical_id.is_empty() || self.nested.contains_key(logical_id) {
            return;
        }

        let mut parents = self.options.parent_stack_logical_ids.clone();
        parents.push(logical_id.to_string());
        tracing::debug!(
            stack = %self.stack_name,
            nested = %logical_id,
            "tracking events of nested stack"
        );
        let child = StackEventPoller::new(
            Arc::clone(&self.sdk),
            physical_id,
            PollerOptions {
                start_time: Some(event.timestamp),
                parent_stack_logical_ids: parents,
                stack_statuses: Vec::new(),
            },
        );
        self.nested.insert(logical_id.to_string(), child);
    }

    fn is_missing_stack(&self, error: &ProvisionError) -> bool {
        match error {
            ProvisionError::StackNotFound(_) => true,
            ProvisionError::Validation(message) => {
                *message == format!("Stack [{}] does not exist", self.stack_name)
            }
            _ => false,
        }
    }
}

fn is_begin_operation(status: &str) -> bool {
    matches!(
        status,
        "CREATE_IN_PROGRESS"
            | "UPDATE_IN_PROGRESS"
            | "DELETE_IN_PROGRESS"
            | "UPDATE_ROLLBACK_IN_PROGRESS"
            | "ROLLBACK_IN_PROGRESS"
    )
}
