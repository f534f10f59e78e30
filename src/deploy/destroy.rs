// ABOUTME: Deletion of a deployed stack under an activity monitor.
// ABOUTME: Absent stacks are a no-op.

use chrono::Utc;

use crate::io::IoHostExt;
use crate::provider::ProvisioningSdk;
use crate::stack::DeployedStack;

use super::DeployError;
use super::stabilize::{self, DeployContext};

/// Delete a stack and wait for the deletion to finish.
///
/// `role_arn` is the execution role with placeholders already resolved.
pub async fn destroy_stack<S>(
    ctx: DeployContext<'_, S>,
    stack_name: &str,
    role_arn: Option<&str>,
) -> Result<(), DeployError>
where
    S: ProvisioningSdk + 'static,
{
    let current = DeployedStack::lookup(ctx.sdk.as_ref(), stack_name)
        .await
        .map_err(|e| DeployError::remote(stack_name, e))?;
    if !current.exists() {
        ctx.io
            .debug(format!("Stack {stack_name} does not exist, nothing to destroy"))
            .await;
        return Ok(());
    }

    let (outcome, report) = stabilize::monitored(ctx, stack_name, None, Utc::now(), async {
        ctx.sdk
            .delete_stack(stack_name, role_arn)
            .await
            .map_err(|e| DeployError::remote(stack_name, e))?;
        let remaining = stabilize::wait_for_stack_delete(
            ctx.sdk.as_ref(),
            ctx.io.as_ref(),
            ctx.polling.stabilize.as_ref(),
            stack_name,
        )
        .await?;
        if let Some(stack) = remaining
            && stack.status().name() != "DELETE_COMPLETE"
        {
            return Err(DeployError::StackOperationFailed {
                stack: stack_name.to_string(),
                message: format!("Failed to destroy {stack_name}: {}", stack.status()),
            });
        }
        Ok(())
    })
    .await;

    outcome.map_err(|e| e.with_monitor_errors(stack_name, &report.errors))
}
