// ABOUTME: Rollback of stacks paused in a failed state.
// ABOUTME: Loops start/continue rollback calls, optionally orphaning resources that block it.

use chrono::Utc;

use crate::environment::EnvironmentResources;
use crate::events::{PollerOptions, StackEventPoller};
use crate::io::IoHostExt;
use crate::provider::{ContinueUpdateRollbackInput, ProvisioningSdk, RollbackStackInput};
use crate::stack::{DeployedStack, RollbackChoice, StackArtifact};

use super::DeployError;
use super::error::suffix_with_errors;
use super::options::RollbackStackOptions;
use super::result::RollbackStackResult;
use super::stabilize::{self, DeployContext};

/// Bootstrap stack version that grants the rollback permissions.
pub const BOOTSTRAP_VERSION_FOR_ROLLBACK: u32 = 23;

/// Statuses that mark the start of the most recent rollback in the event history.
const ROLLBACK_START_STATUSES: [&str; 2] = ["ROLLBACK_IN_PROGRESS", "UPDATE_ROLLBACK_IN_PROGRESS"];

/// Roll back a stack paused in a failed state.
///
/// Each iteration looks the stack up and either starts a rollback, continues
/// a failed update rollback (skipping resources when asked to orphan them),
/// or reports that there is nothing to roll back. When orphaning failed
/// resources, a rollback that fails again is retried until
/// `max_iterations` is reached.
///
/// `role_arn` is the execution role with placeholders already resolved.
///
/// # Errors
///
/// - `DeployError::InvalidConfiguration` when both orphaning modes are requested
/// - `DeployError::RollbackFailed` when the rollback ends in a failed state
/// - `DeployError::RollbackNoProgress` when the loop runs out of iterations
pub async fn rollback_stack<S>(
    ctx: DeployContext<'_, S>,
    artifact: &StackArtifact,
    resources: &EnvironmentResources<S>,
    role_arn: Option<String>,
    options: &RollbackStackOptions,
    max_iterations: u32,
) -> Result<RollbackStackResult, DeployError>
where
    S: ProvisioningSdk + 'static,
{
    let name = artifact.name();
    let mut resources_to_skip = options.orphan_logical_ids.clone();
    if options.orphan_failed_resources && !resources_to_skip.is_empty() {
        return Err(DeployError::InvalidConfiguration(
            "Cannot combine --force with --orphan".to_string(),
        ));
    }

    if options.validate_bootstrap_version {
        resources
            .validate_version(
                Some(BOOTSTRAP_VERSION_FOR_ROLLBACK),
                artifact.bootstrap_stack_version_ssm_parameter.as_deref(),
            )
            .await
            .map_err(|e| DeployError::environment(name, e))?;
    }

    for iteration in 0..max_iterations {
        let stack = DeployedStack::lookup(ctx.sdk.as_ref(), name)
            .await
            .map_err(|e| DeployError::remote(name, e))?;
        let stack_arn = stack.stack_id().cloned();
        let status = stack.status();
        tracing::debug!(stack = name, iteration, status = %status, "rollback iteration");

        match status.rollback_choice() {
            RollbackChoice::None => {
                ctx.io
                    .warn(format!("Stack {name} does not need a rollback: {status}"))
                    .await;
                return Ok(RollbackStackResult::NotInRollbackableState { stack_arn });
            }
            RollbackChoice::StartRollback => {
                ctx.io
                    .debug(format!("Initiating rollback of stack {name}"))
                    .await;
                ctx.sdk
                    .rollback_stack(&RollbackStackInput {
                        stack_name: name.to_string(),
                        role_arn: role_arn.clone(),
                        client_request_token: uuid::Uuid::new_v4().to_string(),
                        retain_except_on_create: true,
                    })
                    .await
                    .map_err(|e| DeployError::remote(name, e))?;
            }
            RollbackChoice::ContinueUpdateRollback => {
                if options.orphan_failed_resources {
                    resources_to_skip = failed_resources(ctx, name).await?;
                }
                let skip_description = if resources_to_skip.is_empty() {
                    String::new()
                } else {
                    format!(" (orphaning: {})", resources_to_skip.join(", "))
                };
                ctx.io
                    .warn(format!(
                        "Continuing rollback of stack {name}{skip_description}"
                    ))
                    .await;
                ctx.sdk
                    .continue_update_rollback(&ContinueUpdateRollbackInput {
                        stack_name: name.to_string(),
                        role_arn: role_arn.clone(),
                        client_request_token: uuid::Uuid::new_v4().to_string(),
                        resources_to_skip: resources_to_skip.clone(),
                    })
                    .await
                    .map_err(|e| DeployError::remote(name, e))?;
            }
            RollbackChoice::RollbackFailed => {
                ctx.io
                    .warn(format!(
                        "Stack {name} failed creation and rollback. This state cannot be rolled back. You can recreate this stack by running 'deploy'."
                    ))
                    .await;
                return Ok(RollbackStackResult::NotInRollbackableState { stack_arn });
            }
        }

        let (outcome, report) = stabilize::monitored(
            ctx,
            name,
            None,
            Utc::now(),
            stabilize::stabilize_stack(
                ctx.sdk.as_ref(),
                ctx.io.as_ref(),
                ctx.polling.stabilize.as_ref(),
                name,
            ),
        )
        .await;

        let (final_status, error_message) = match outcome {
            Ok(Some(final_stack)) => (final_stack.status(), report.error_summary()),
            Ok(None) => (
                status,
                Some(suffix_with_errors(
                    "Stack deploy failed (the stack disappeared while we were rolling it back)",
                    &report.errors,
                )),
            ),
            Err(e) => (status, Some(suffix_with_errors(&e.to_string(), &report.errors))),
        };

        let Some(message) = error_message else {
            return Ok(RollbackStackResult::Success { stack_arn });
        };
        if final_status.is_rollback_success() {
            return Ok(RollbackStackResult::Success { stack_arn });
        }
        if final_status.rollback_choice() == RollbackChoice::ContinueUpdateRollback
            && options.orphan_failed_resources
        {
            continue;
        }
        return Err(DeployError::RollbackFailed {
            stack: name.to_string(),
            message,
        });
    }

    Err(DeployError::RollbackNoProgress {
        stack: name.to_string(),
        iterations: max_iterations,
    })
}

/// Top-level resources that failed during the most recent rollback.
async fn failed_resources<S>(ctx: DeployContext<'_, S>, name: &str) -> Result<Vec<String>, DeployError>
where
    S: ProvisioningSdk + 'static,
{
    let mut poller = StackEventPoller::new(
        std::sync::Arc::clone(ctx.sdk),
        name,
        PollerOptions {
            stack_statuses: ROLLBACK_START_STATUSES.iter().map(|s| s.to_string()).collect(),
            ..PollerOptions::default()
        },
    );
    poller
        .poll()
        .await
        .map_err(|e| DeployError::remote(name, e))?;
    Ok(poller
        .resource_errors()
        .into_iter()
        .filter(|r| r.parent_stack_logical_ids.is_empty())
        .filter_map(|r| r.event.logical_resource_id)
        .collect())
}
