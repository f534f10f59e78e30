// ABOUTME: Completed-resource counter for a running stack operation.
// ABOUTME: A resource completing twice means it is being rolled back, so the count goes down.

use crate::provider::StackEvent;
use crate::types::MonitorId;
use serde::Serialize;
use std::collections::HashMap;

/// Progress of one stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StackProgress {
    pub completed: usize,
    /// Resources in the change set plus the stack itself, when known.
    pub total: Option<usize>,
}

impl std::fmt::Display for StackProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.total {
            Some(total) => {
                let width = total.to_string().len();
                write!(f, "{:>width$}/{}", self.completed, total)
            }
            None => write!(f, "{}", self.completed),
        }
    }
}

/// One stack event as reported to the io host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StackActivity {
    pub deployment: MonitorId,
    pub event: StackEvent,
    pub parent_stack_logical_ids: Vec<String>,
    pub progress: StackProgress,
}

/// Counts resources as they complete.
#[derive(Debug, Default)]
pub struct ProgressMonitor {
    total: Option<usize>,
    done: usize,
    previous_complete: HashMap<String, String>,
}

impl ProgressMonitor {
    pub fn new(resources_total: Option<usize>) -> Self {
        Self {
            total: resources_total.filter(|n| *n > 0).map(|n| n + 1),
            done: 0,
            previous_complete: HashMap::new(),
        }
    }

    pub fn process(&mut self, event: &StackEvent) {
        let (Some(status), Some(logical_id)) = (
            event.resource_status.as_deref(),
            event.logical_resource_id.as_deref(),
        ) else {
            return;
        };

        if status.ends_with("_COMPLETE_CLEANUP_IN_PROGRESS") {
            self.done += 1;
        }

        if status.ends_with("_COMPLETE") {
            if self.previous_complete.contains_key(logical_id) {
                self.done = self.done.saturating_sub(1);
            } else {
                self.done += 1;
            }
            self.previous_complete
                .insert(logical_id.to_string(), status.to_string());
        }
    }

    pub fn progress(&self) -> StackProgress {
        StackProgress {
            completed: self.done,
            total: self.total,
        }
    }
}
