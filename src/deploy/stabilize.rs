// ABOUTME: Wait loops for stacks and change sets to reach a stable state.
// ABOUTME: Runs remote operations under an activity monitor and folds its errors into failures.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::DeployError;
use super::error::suffix_with_errors;
use crate::events::{ActivityMonitor, MonitorOptions, MonitorReport};
use crate::io::{IoHost, IoHostExt};
use crate::poll::{self, PollSchedule, Polling};
use crate::provider::{ChangeSetDescription, ProvisioningSdk, StackOps};
use crate::stack::DeployedStack;

/// Shared handles every remote lifecycle step needs.
pub struct DeployContext<'a, S> {
    pub sdk: &'a Arc<S>,
    pub io: &'a Arc<dyn IoHost>,
    pub polling: &'a Polling,
}

impl<S> Clone for DeployContext<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for DeployContext<'_, S> {}

impl<'a, S> DeployContext<'a, S> {
    pub fn new(sdk: &'a Arc<S>, io: &'a Arc<dyn IoHost>, polling: &'a Polling) -> Self {
        Self { sdk, io, polling }
    }
}

impl DeployError {
    /// Suffix monitor errors onto a failure.
    pub(crate) fn with_monitor_errors(self, stack: &str, errors: &[String]) -> Self {
        if errors.is_empty() {
            return self;
        }
        let message = match self {
            DeployError::StackOperationFailed { message, .. } => message,
            other => other.to_string(),
        };
        DeployError::StackOperationFailed {
            stack: stack.to_string(),
            message: suffix_with_errors(&message, errors),
        }
    }

    fn failed(stack: &str, message: String) -> Self {
        DeployError::StackOperationFailed {
            stack: stack.to_string(),
            message,
        }
    }
}

/// Poll until the stack is no longer in progress. `None` when it does not exist.
pub(crate) async fn stabilize_stack<S>(
    sdk: &S,
    io: &dyn IoHost,
    schedule: &dyn PollSchedule,
    stack_name: &str,
) -> Result<Option<DeployedStack>, DeployError>
where
    S: StackOps + ?Sized,
{
    io.debug(format!(
        "Waiting for stack {stack_name} to finish creating or updating..."
    ))
    .await;
    let mut attempt = 0;
    loop {
        let stack = DeployedStack::lookup(sdk, stack_name)
            .await
            .map_err(|e| DeployError::remote(stack_name, e))?;
        if !stack.exists() {
            io.debug(format!("Stack {stack_name} does not exist")).await;
            return Ok(None);
        }
        let status = stack.status();
        if !status.is_in_progress() {
            if status.is_review_in_progress() {
                // An interrupted create leaves a pending change set behind; treat it as stable.
                io.debug(format!(
                    "Stack {stack_name} is in REVIEW_IN_PROGRESS state. Considering this is a stable status ({status})"
                ))
                .await;
            }
            return Ok(Some(stack));
        }
        io.debug(format!(
            "Stack {stack_name} has an ongoing operation in progress and is not stable ({status})"
        ))
        .await;
        poll::wait(schedule.delay(attempt)).await;
        attempt = attempt.saturating_add(1);
    }
}

/// Wait for a create or update to finish and require a successful status.
pub(crate) async fn wait_for_stack_deploy<S>(
    sdk: &S,
    io: &dyn IoHost,
    schedule: &dyn PollSchedule,
    stack_name: &str,
) -> Result<Option<DeployedStack>, DeployError>
where
    S: StackOps + ?Sized,
{
    let Some(stack) = stabilize_stack(sdk, io, schedule, stack_name).await? else {
        return Ok(None);
    };
    let status = stack.status();
    if status.is_creation_failure() {
        return Err(DeployError::failed(
            stack_name,
            format!(
                "The stack named {stack_name} failed creation, it may need to be manually deleted from the AWS console: {status}"
            ),
        ));
    }
    if !status.is_deploy_success() {
        return Err(DeployError::failed(
            stack_name,
            format!("The stack named {stack_name} failed to deploy: {status}"),
        ));
    }
    Ok(Some(stack))
}

/// Wait for a delete to finish. `None` once the stack is gone.
pub(crate) async fn wait_for_stack_delete<S>(
    sdk: &S,
    io: &dyn IoHost,
    schedule: &dyn PollSchedule,
    stack_name: &str,
) -> Result<Option<DeployedStack>, DeployError>
where
    S: StackOps + ?Sized,
{
    let Some(stack) = stabilize_stack(sdk, io, schedule, stack_name).await? else {
        return Ok(None);
    };
    let status = stack.status();
    if status.is_failure() {
        return Err(DeployError::failed(
            stack_name,
            format!(
                "The stack named {stack_name} is in a failed state. You may need to delete it from the AWS console : {status}"
            ),
        ));
    }
    if status.is_deleted() {
        return Ok(None);
    }
    Ok(Some(stack))
}

/// Poll a change set until it is created, or refused for having no changes.
pub(crate) async fn wait_for_change_set<S>(
    sdk: &S,
    io: &dyn IoHost,
    schedule: &dyn PollSchedule,
    stack_name: &str,
    change_set_name: &str,
) -> Result<ChangeSetDescription, DeployError>
where
    S: StackOps + ?Sized,
{
    io.debug(format!(
        "Waiting for changeset {change_set_name} on stack {stack_name} to finish creating..."
    ))
    .await;
    let mut attempt = 0;
    loop {
        let description = sdk
            .describe_change_set(stack_name, change_set_name)
            .await
            .map_err(|e| DeployError::remote(stack_name, e))?;
        match description.status.as_str() {
            "CREATE_PENDING" | "CREATE_IN_PROGRESS" => {
                io.debug(format!(
                    "Changeset {change_set_name} on stack {stack_name} is still creating"
                ))
                .await;
            }
            "CREATE_COMPLETE" => return Ok(description),
            _ if description.has_no_changes() => return Ok(description),
            status => {
                let reason = description
                    .status_reason
                    .as_deref()
                    .unwrap_or("no reason provided");
                return Err(DeployError::failed(
                    stack_name,
                    format!(
                        "Failed to create ChangeSet {change_set_name} on {stack_name}: {status}, {reason}"
                    ),
                ));
            }
        }
        poll::wait(schedule.delay(attempt)).await;
        attempt = attempt.saturating_add(1);
    }
}

/// Run `operation` while an activity monitor follows the stack.
///
/// The monitor is stopped (flushing any remaining events) before returning,
/// whatever the operation's outcome.
pub(crate) async fn monitored<S, F, T>(
    ctx: DeployContext<'_, S>,
    stack_name: &str,
    resources_total: Option<usize>,
    start_time: DateTime<Utc>,
    operation: F,
) -> (Result<T, DeployError>, MonitorReport)
where
    S: ProvisioningSdk + 'static,
    F: Future<Output = Result<T, DeployError>>,
{
    let monitor = ActivityMonitor::start(
        Arc::clone(ctx.sdk),
        Arc::clone(ctx.io),
        stack_name,
        MonitorOptions {
            resources_total,
            start_time: Some(start_time),
            schedule: Arc::clone(&ctx.polling.monitor),
        },
    );
    let outcome = operation.await;
    let report = monitor.stop().await;
    (outcome, report)
}
