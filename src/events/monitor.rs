// ABOUTME: Background task that follows a stack operation while it runs.
// ABOUTME: Forwards every event to the io host and collects failure reasons.

use super::poller::{PollerOptions, ResourceEvent, StackEventPoller};
use super::progress::{ProgressMonitor, StackActivity};
use crate::io::{IoHost, IoHostExt, IoMessage};
use crate::poll::{self, PollSchedule};
use crate::provider::{ProvisionError, StackOps};
use crate::types::MonitorId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Statuses whose reason explains a failure.
pub fn stack_event_has_error_message(status: &str) -> bool {
    status.ends_with("_FAILED")
        || status == "ROLLBACK_IN_PROGRESS"
        || status == "UPDATE_ROLLBACK_IN_PROGRESS"
}

#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Resources in the change set, when known.
    pub resources_total: Option<usize>,
    /// Ignore events older than this. Defaults to the moment of `start`.
    pub start_time: Option<DateTime<Utc>>,
    pub schedule: Arc<dyn PollSchedule>,
}

/// What the monitor saw between `start` and `stop`.
#[derive(Debug, Clone, Default)]
pub struct MonitorReport {
    pub errors: Vec<String>,
    pub events: Vec<ResourceEvent>,
}

impl MonitorReport {
    /// Failure reasons joined for inclusion in an error message.
    pub fn error_summary(&self) -> Option<String> {
        if self.errors.is_empty() {
            None
        } else {
            Some(self.errors.join(", "))
        }
    }
}

struct MonitorState<S> {
    id: MonitorId,
    stack_name: String,
    poller: StackEventPoller<S>,
    progress: ProgressMonitor,
    errors: Vec<String>,
    io: Arc<dyn IoHost>,
}

impl<S> MonitorState<S>
where
    S: StackOps + 'static,
{
    async fn read_new_events(&mut self) -> Result<(), ProvisionError> {
        for resource_event in self.poller.poll().await? {
            self.progress.process(&resource_event.event);
            self.check_for_errors(&resource_event);

            let activity = StackActivity {
                deployment: self.id.clone(),
                event: resource_event.event,
                parent_stack_logical_ids: resource_event.parent_stack_logical_ids,
                progress: self.progress.progress(),
            };
            let message = format_activity(&activity);
            self.io.notify(IoMessage::activity(message, activity)).await;
        }
        Ok(())
    }

    fn check_for_errors(&mut self, resource_event: &ResourceEvent) {
        let event = &resource_event.event;
        let status = event.resource_status.as_deref().unwrap_or_default();
        if !stack_event_has_error_message(status) {
            return;
        }
        let reason = event.resource_status_reason.clone().unwrap_or_default();
        let is_cancelled = reason.contains("cancelled");
        let is_own_event = event.logical_resource_id.as_deref() == Some(event.stack_name.as_str());
        if !is_cancelled && !is_own_event {
            self.errors.push(reason);
        }
    }

    fn into_report(self) -> MonitorReport {
        MonitorReport {
            errors: self.errors,
            events: self.poller.events().to_vec(),
        }
    }
}

fn format_activity(activity: &StackActivity) -> String {
    let event = &activity.event;
    let mut logical_id = activity.parent_stack_logical_ids.join(".");
    if let Some(id) = &event.logical_resource_id {
        if !logical_id.is_empty() {
            logical_id.push('.');
        }
        logical_id.push_str(id);
    }
    let mut line = format!(
        "{} | {} | {} | {} | {} | {}",
        event.stack_name,
        activity.progress,
        event.timestamp.format("%H:%M:%S"),
        event.resource_status.as_deref().unwrap_or_default(),
        event.resource_type.as_deref().unwrap_or_default(),
        logical_id,
    );
    if let Some(reason) = &event.resource_status_reason
        && event
            .resource_status
            .as_deref()
            .is_some_and(stack_event_has_error_message)
    {
        line.push(' ');
        line.push_str(reason);
    }
    line
}

/// Follows one stack operation on a spawned task.
///
/// Call [`ActivityMonitor::stop`] to flush the remaining events and get the
/// report. Dropping a monitor without stopping it aborts the task.
pub struct ActivityMonitor {
    id: MonitorId,
    stack_name: String,
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<MonitorReport>>,
}

impl std::fmt::Debug for ActivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityMonitor")
            .field("id", &self.id)
            .field("stack_name", &self.stack_name)
            .finish()
    }
}

impl ActivityMonitor {
    /// Start following `stack_name`.
    pub fn start<S>(
        sdk: Arc<S>,
        io: Arc<dyn IoHost>,
        stack_name: &str,
        options: MonitorOptions,
    ) -> Self
    where
        S: StackOps + 'static,
    {
        let id = MonitorId::generate();
        let poller = StackEventPoller::new(
            sdk,
            stack_name,
            PollerOptions {
                start_time: Some(options.start_time.unwrap_or_else(Utc::now)),
                ..PollerOptions::default()
            },
        );
        let state = MonitorState {
            id: id.clone(),
            stack_name: stack_name.to_string(),
            poller,
            progress: ProgressMonitor::new(options.resources_total),
            errors: Vec::new(),
            io,
        };
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(state, options.schedule, stop_rx));

        tracing::debug!(stack = %stack_name, monitor = %id.as_str(), "activity monitor started");
        Self {
            id,
            stack_name: stack_name.to_string(),
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    pub fn id(&self) -> &MonitorId {
        &self.id
    }

    /// Finish any in-flight poll, poll once more and return what was seen.
    pub async fn stop(mut self) -> MonitorReport {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let Some(handle) = self.handle.take() else {
            return MonitorReport::default();
        };
        match handle.await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(stack = %self.stack_name, "activity monitor task failed: {e}");
                MonitorReport::default()
            }
        }
    }
}

impl Drop for ActivityMonitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run<S>(
    mut state: MonitorState<S>,
    schedule: Arc<dyn PollSchedule>,
    mut stop_rx: oneshot::Receiver<()>,
) -> MonitorReport
where
    S: StackOps + 'static,
{
    let mut attempt = 0u32;
    loop {
        // Only the wait races the stop signal; a poll already started runs to completion.
        tokio::select! {
            biased;
            _ = &mut stop_rx => break,
            _ = poll::wait(schedule.delay(attempt)) => {}
        }
        if let Err(e) = state.read_new_events().await {
            state
                .io
                .warn(format!(
                    "Error occurred while monitoring stack {}: {e}",
                    state.stack_name
                ))
                .await;
        }
        attempt = attempt.saturating_add(1);
    }

    if let Err(e) = state.read_new_events().await {
        state
            .io
            .warn(format!(
                "Error occurred while monitoring stack {}: {e}",
                state.stack_name
            ))
            .await;
    }
    tracing::debug!(stack = %state.stack_name, "activity monitor stopped");
    state.into_report()
}
