// ABOUTME: State transition methods for stack deployment.
// ABOUTME: Each method consumes self and returns the next state, or a final result.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use crate::environment::EnvironmentResources;
use crate::io::IoHostExt;
use crate::provider::{
    ChangeSetDescription, ChangeSetType, CreateChangeSetInput, CreateStackInput,
    ExecuteChangeSetInput, ProvisionError, ProvisioningSdk, TemplateSubmission, UpdateStackInput,
};
use crate::stack::DeployedStack;
use crate::types::StackId;

use super::DeployError;
use super::deployment::{CAPABILITIES, StackDeployment};
use super::hotswap::{HotswapOutcome, Hotswapper};
use super::options::{DeploymentMethod, HotswapMode};
use super::parameters::{ParameterChanges, ResolvedParameters, TemplateParameters};
use super::result::{DeployStackResult, RollbackReason};
use super::stabilize::{self, DeployContext};
use super::state::{BootstrapValidated, Initialized, Prepared, Submitted};

/// Result type for transitions that move to the next state.
pub type TransitionResult<T> = Result<StackDeployment<T>, DeployError>;

/// Outcome of preparing a deployment.
#[derive(Debug)]
pub enum PrepareOutcome {
    /// Nothing changed; the deployment is skipped.
    Skip(DeployStackResult),
    Ready(StackDeployment<Prepared>),
}

/// Outcome of submitting a template.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// No stabilization needed (no-op, review-only, or paused failure).
    Finished(DeployStackResult),
    Submitted(StackDeployment<Submitted>),
}

// =============================================================================
// Initialized -> BootstrapValidated
// =============================================================================

impl StackDeployment<Initialized> {
    /// Check the environment's bootstrap stack satisfies the stack's requirement.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::BootstrapVersionMismatch` prefixed with the stack name.
    #[must_use = "deployment state must be used"]
    pub async fn validate_bootstrap<S>(
        self,
        resources: &EnvironmentResources<S>,
    ) -> TransitionResult<BootstrapValidated>
    where
        S: ProvisioningSdk + 'static,
    {
        resources
            .validate_version(
                self.artifact.requires_bootstrap_stack_version,
                self.artifact.bootstrap_stack_version_ssm_parameter.as_deref(),
            )
            .await
            .map_err(|e| DeployError::environment(self.stack_name(), e))?;
        Ok(self.transition(BootstrapValidated))
    }
}

// =============================================================================
// BootstrapValidated -> Prepared
// =============================================================================

impl StackDeployment<BootstrapValidated> {
    /// Look up the deployed stack and check every declared parameter will get a value.
    ///
    /// Runs before assets are prepared, so a missing value fails ahead of any
    /// mutating call. `asset_parameters` names the parameters that assets
    /// will fill in.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::MissingParameterValue` naming every parameter
    /// without a value.
    pub async fn check_parameters<S>(
        &self,
        ctx: DeployContext<'_, S>,
        asset_parameters: &BTreeSet<String>,
    ) -> Result<DeployedStack, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let name = self.stack_name();
        let deployed = DeployedStack::lookup(ctx.sdk.as_ref(), name)
            .await
            .map_err(|e| DeployError::remote(name, e))?;

        let mut values = self.options.parameters.clone();
        values.extend(asset_parameters.iter().map(|p| (p.clone(), String::new())));
        self.resolve_parameters(&deployed, &values)?;
        Ok(deployed)
    }

    /// Previous values of a stack that failed creation are never reused:
    /// the stack is deleted and created again.
    fn resolve_parameters(
        &self,
        deployed: &DeployedStack,
        values: &BTreeMap<String, String>,
    ) -> Result<ResolvedParameters, DeployError> {
        let declared = TemplateParameters::from_template(&self.template);
        let previous = if deployed.status().is_creation_failure() {
            BTreeMap::new()
        } else {
            deployed.parameters()
        };
        if self.options.use_previous_parameters {
            declared.update_existing(values, &previous)
        } else {
            declared.supply_all(values)
        }
        .map_err(|source| DeployError::MissingParameterValue {
            stack: self.stack_name().to_string(),
            source,
        })
    }

    /// Resolve parameters against `deployed` and decide whether to skip.
    ///
    /// A stack that failed creation is deleted first so it can be re-created.
    /// `asset_parameters` hold asset locations and take precedence over
    /// explicit parameters.
    #[must_use = "deployment state must be used"]
    pub async fn prepare<S>(
        self,
        ctx: DeployContext<'_, S>,
        mut deployed: DeployedStack,
        asset_parameters: BTreeMap<String, String>,
    ) -> Result<PrepareOutcome, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let name = self.stack_name().to_string();
        let mut values = self.options.parameters.clone();
        values.extend(asset_parameters);
        let resolved = self.resolve_parameters(&deployed, &values)?;

        if deployed.status().is_creation_failure() {
            ctx.io
                .debug(format!(
                    "Found existing stack {name} that had previously failed creation. Deleting it before attempting to re-create it."
                ))
                .await;
            ctx.sdk
                .delete_stack(&name, None)
                .await
                .map_err(|e| DeployError::remote(&name, e))?;
            let remaining = stabilize::wait_for_stack_delete(
                ctx.sdk.as_ref(),
                ctx.io.as_ref(),
                ctx.polling.stabilize.as_ref(),
                &name,
            )
            .await?;
            if let Some(stack) = remaining
                && stack.status().name() != "DELETE_COMPLETE"
            {
                return Err(DeployError::StackOperationFailed {
                    stack: name.clone(),
                    message: format!(
                        "Failed deleting stack {name} that had previously failed creation (current state: {})",
                        stack.status()
                    ),
                });
            }
            deployed = DeployedStack::does_not_exist(&name);
        }

        let changes = resolved.changes();
        if self.can_skip_deploy(ctx, &deployed, changes).await? {
            ctx.io
                .debug(format!(
                    "{name}: skipping deployment (use --force to override)"
                ))
                .await;
            if self.options.hotswap != HotswapMode::FullDeployment {
                ctx.io
                    .info(
                        "hotswap deployment skipped - no changes were detected (use --force to override)"
                            .to_string(),
                    )
                    .await;
            }
            return Ok(PrepareOutcome::Skip(DeployStackResult::no_op(
                deployed.outputs(),
                deployed.stack_id().cloned(),
            )));
        }
        ctx.io.debug(format!("{name}: deploying...")).await;

        Ok(PrepareOutcome::Ready(self.transition(Prepared {
            deployed,
            parameters: resolved,
        })))
    }

    async fn can_skip_deploy<S>(
        &self,
        ctx: DeployContext<'_, S>,
        deployed: &DeployedStack,
        changes: ParameterChanges,
    ) -> Result<bool, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let name = self.stack_name();
        ctx.io
            .debug(format!("{name}: checking if we can skip deploy"))
            .await;

        let reason = if self.options.force {
            Some("forced deployment")
        } else if self.options.method.is_review_only() {
            Some("--no-execute, always creating change set")
        } else if !deployed.exists() {
            Some("no existing stack")
        } else if deployed
            .template(ctx.sdk.as_ref())
            .await
            .map_err(|e| DeployError::remote(name, e))?
            != self.template
        {
            Some("template has changed")
        } else if deployed.tags() != self.tags() {
            Some("tags have changed")
        } else if deployed.termination_protection() != self.artifact.termination_protection {
            Some("termination protection has been updated")
        } else if changes == ParameterChanges::Store {
            Some("some parameters come from SSM so we have to assume they may have changed")
        } else if changes.is_changed() {
            Some("parameters have changed")
        } else if deployed.status().is_failure() {
            Some("stack is in a failure state")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                ctx.io.debug(format!("{name}: {reason}")).await;
                Ok(false)
            }
            None => Ok(true),
        }
    }
}

// =============================================================================
// Prepared -> Submitted
// =============================================================================

impl StackDeployment<Prepared> {
    /// Attempt a hotswap when the options ask for one.
    ///
    /// Returns a final result when the hotswap applied, or when hotswap-only
    /// mode found nothing to hotswap. `None` means continue with a full deployment.
    pub async fn try_hotswap<S>(
        &self,
        ctx: DeployContext<'_, S>,
        hotswapper: &dyn Hotswapper,
    ) -> Result<Option<DeployStackResult>, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let mode = self.options.hotswap;
        let deployed = &self.state.deployed;
        if mode == HotswapMode::FullDeployment || !deployed.exists() {
            return Ok(None);
        }
        let values = self.state.parameters.values(&deployed.parameters());
        match hotswapper
            .try_hotswap(&self.artifact, deployed, &values, mode)
            .await?
        {
            HotswapOutcome::Applied => Ok(Some(DeployStackResult::deployed(
                deployed.outputs(),
                deployed.stack_id().cloned(),
            ))),
            HotswapOutcome::NotHotswappable(reason) => {
                ctx.io
                    .info(format!(
                        "Could not perform a hotswap deployment, as {reason}"
                    ))
                    .await;
                if mode == HotswapMode::HotswapOnly {
                    ctx.io
                        .warn(
                            "No hotswappable changes found. Skipping full deployment (--hotswap only)"
                                .to_string(),
                        )
                        .await;
                    return Ok(Some(DeployStackResult::no_op(
                        deployed.outputs(),
                        deployed.stack_id().cloned(),
                    )));
                }
                ctx.io
                    .info("Falling back to doing a full deployment".to_string())
                    .await;
                Ok(None)
            }
        }
    }

    /// Submit the template, directly or through a change set.
    #[must_use = "deployment state must be used"]
    pub async fn submit<S>(self, ctx: DeployContext<'_, S>) -> Result<SubmitOutcome, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        match self.options.method.clone() {
            DeploymentMethod::Direct => self.direct_deployment(ctx).await,
            DeploymentMethod::ChangeSet {
                execute,
                name,
                import_existing_resources,
            } => {
                self.change_set_deployment(ctx, &name, execute, import_existing_resources)
                    .await
            }
        }
    }

    fn submission(&self) -> TemplateSubmission {
        TemplateSubmission {
            stack_name: self.stack_name().to_string(),
            template: self.template.clone(),
            parameters: self.state.parameters.api_parameters(),
            role_arn: self.role_arn.clone(),
            tags: self.tags(),
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn is_update(&self) -> bool {
        self.state.deployed.exists()
    }

    fn finished_no_op(&self) -> SubmitOutcome {
        let deployed = &self.state.deployed;
        SubmitOutcome::Finished(DeployStackResult::no_op(
            deployed.outputs(),
            deployed.stack_id().cloned(),
        ))
    }

    fn submitted(
        self,
        stack_id: StackId,
        resources_total: Option<usize>,
        start_time: chrono::DateTime<Utc>,
    ) -> SubmitOutcome {
        let deployed = self.state.deployed.clone();
        SubmitOutcome::Submitted(self.transition(Submitted {
            deployed,
            stack_id,
            start_time,
            resources_total,
        }))
    }

    async fn direct_deployment<S>(self, ctx: DeployContext<'_, S>) -> Result<SubmitOutcome, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let name = self.stack_name().to_string();
        let verb = if self.is_update() { "updating" } else { "creating" };
        ctx.io.info(format!("{name}: {verb} stack...")).await;
        let start_time = Utc::now();
        let disable_rollback = !self.options.rollback;

        let stack_id = if self.is_update() {
            self.update_termination_protection(ctx).await?;
            let input = UpdateStackInput {
                submission: self.submission(),
                client_request_token: format!("update{}", self.execution_id),
                disable_rollback,
            };
            match ctx.sdk.update_stack(&input).await {
                Ok(stack_id) => stack_id,
                Err(ProvisionError::NoUpdates) => {
                    ctx.io
                        .debug(format!("No updates are to be performed for stack {name}"))
                        .await;
                    return Ok(self.finished_no_op());
                }
                Err(e) => return Err(DeployError::remote(&name, e)),
            }
        } else {
            let input = CreateStackInput {
                submission: self.submission(),
                client_request_token: format!("create{}", self.execution_id),
                termination_protection: self.artifact.termination_protection,
                disable_rollback,
            };
            ctx.sdk
                .create_stack(&input)
                .await
                .map_err(|e| DeployError::remote(&name, e))?
        };
        ctx.io
            .debug(format!("{name}: submitted as {stack_id}"))
            .await;
        Ok(self.submitted(stack_id, None, start_time))
    }

    async fn change_set_deployment<S>(
        self,
        ctx: DeployContext<'_, S>,
        change_set_name: &str,
        execute: bool,
        import_existing_resources: bool,
    ) -> Result<SubmitOutcome, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let name = self.stack_name().to_string();
        let description = self
            .create_change_set(ctx, change_set_name, import_existing_resources)
            .await?;
        self.update_termination_protection(ctx).await?;

        if description.has_no_changes() {
            ctx.io
                .debug(format!("No changes are to be performed on {name}."))
                .await;
            if execute {
                ctx.io
                    .debug(format!(
                        "Deleting empty change set {}",
                        description.change_set_id
                    ))
                    .await;
                ctx.sdk
                    .delete_change_set(&name, change_set_name)
                    .await
                    .map_err(|e| DeployError::remote(&name, e))?;
            }
            if self.options.force {
                ctx.io
                    .warn(
                        [
                            "You used the --force flag, but the provisioning service reported that the deployment would not make any changes.",
                            "According to the service, all resources are already up-to-date with the state in your app.",
                            "",
                            "You cannot use the --force flag to get rid of changes you made in the console. Try using",
                            "drift detection instead.",
                        ]
                        .join("\n"),
                    )
                    .await;
            }
            return Ok(SubmitOutcome::Finished(DeployStackResult::no_op(
                self.state.deployed.outputs(),
                Some(description.stack_id),
            )));
        }

        if !execute {
            ctx.io
                .info(format!(
                    "Changeset {} created and waiting in review for manual execution (--no-execute)",
                    description.change_set_id
                ))
                .await;
            return Ok(SubmitOutcome::Finished(DeployStackResult::deployed(
                self.state.deployed.outputs(),
                Some(description.stack_id),
            )));
        }

        let status = self.state.deployed.status();
        let replacement = description.has_replacement();
        let paused = status.is_rollbackable();
        if paused && replacement {
            return Ok(SubmitOutcome::Finished(DeployStackResult::NeedsRollbackFirst {
                reason: RollbackReason::Replacement,
                status: status.name().to_string(),
            }));
        }
        if paused && self.options.rollback {
            return Ok(SubmitOutcome::Finished(DeployStackResult::NeedsRollbackFirst {
                reason: RollbackReason::NotNoRollback,
                status: status.name().to_string(),
            }));
        }
        if !self.options.rollback && replacement {
            return Ok(SubmitOutcome::Finished(
                DeployStackResult::ReplacementRequiresRollback,
            ));
        }

        self.execute_change_set(ctx, change_set_name, description).await
    }

    async fn create_change_set<S>(
        &self,
        ctx: DeployContext<'_, S>,
        change_set_name: &str,
        import_existing_resources: bool,
    ) -> Result<ChangeSetDescription, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let name = self.stack_name();
        if self.is_update() {
            // Change set names are unique per stack; deleting a missing one succeeds.
            ctx.io
                .debug(format!(
                    "Removing existing change set with name {change_set_name} if it exists"
                ))
                .await;
            ctx.sdk
                .delete_change_set(name, change_set_name)
                .await
                .map_err(|e| DeployError::remote(name, e))?;
        }

        let change_set_type = if !self.options.resources_to_import.is_empty() {
            ChangeSetType::Import
        } else if self.is_update() {
            ChangeSetType::Update
        } else {
            ChangeSetType::Create
        };
        ctx.io
            .info(format!("{name}: creating change set..."))
            .await;
        let input = CreateChangeSetInput {
            submission: self.submission(),
            change_set_name: change_set_name.to_string(),
            change_set_type,
            resources_to_import: self.options.resources_to_import.clone(),
            import_existing_resources,
            description: format!("Changeset for execution {}", self.execution_id),
            client_token: format!("create{}", self.execution_id),
        };
        let id = ctx
            .sdk
            .create_change_set(&input)
            .await
            .map_err(|e| DeployError::remote(name, e))?;
        ctx.io
            .debug(format!(
                "Initiated creation of changeset: {id}; waiting for it to finish creating..."
            ))
            .await;

        stabilize::wait_for_change_set(
            ctx.sdk.as_ref(),
            ctx.io.as_ref(),
            ctx.polling.change_set.as_ref(),
            name,
            change_set_name,
        )
        .await
    }

    async fn execute_change_set<S>(
        self,
        ctx: DeployContext<'_, S>,
        change_set_name: &str,
        description: ChangeSetDescription,
    ) -> Result<SubmitOutcome, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let name = self.stack_name().to_string();
        ctx.io
            .debug(format!(
                "Initiating execution of changeset {} on stack {name}",
                description.change_set_id
            ))
            .await;
        let input = ExecuteChangeSetInput {
            stack_name: name.clone(),
            change_set_name: change_set_name.to_string(),
            client_request_token: format!("exec{}", self.execution_id),
            disable_rollback: !self.options.rollback,
        };
        ctx.sdk
            .execute_change_set(&input)
            .await
            .map_err(|e| DeployError::remote(&name, e))?;

        // Updates emit one extra stack-level event.
        let total = description.changes.len() + usize::from(self.is_update());
        Ok(self.submitted(description.stack_id, Some(total), description.creation_time))
    }

    async fn update_termination_protection<S>(
        &self,
        ctx: DeployContext<'_, S>,
    ) -> Result<(), DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let desired = self.artifact.termination_protection;
        let deployed = &self.state.deployed;
        if !deployed.exists() || deployed.termination_protection() == desired {
            return Ok(());
        }
        let name = self.stack_name();
        ctx.io
            .debug(format!(
                "Updating termination protection from {} to {desired} for stack {name}",
                deployed.termination_protection()
            ))
            .await;
        ctx.sdk
            .update_termination_protection(name, desired)
            .await
            .map_err(|e| DeployError::remote(name, e))
    }
}

// =============================================================================
// Submitted -> done
// =============================================================================

impl StackDeployment<Submitted> {
    /// Follow the stack until the operation finishes.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::StackOperationFailed` when the stack ends in a
    /// failed state, with resource failures seen by the monitor appended.
    pub async fn stabilize<S>(self, ctx: DeployContext<'_, S>) -> Result<DeployStackResult, DeployError>
    where
        S: ProvisioningSdk + 'static,
    {
        let name = self.stack_name().to_string();
        let (outcome, report) = stabilize::monitored(
            ctx,
            &name,
            self.state.resources_total,
            self.state.start_time,
            stabilize::wait_for_stack_deploy(
                ctx.sdk.as_ref(),
                ctx.io.as_ref(),
                ctx.polling.stabilize.as_ref(),
                &name,
            ),
        )
        .await;

        let stack = match outcome {
            Ok(Some(stack)) => stack,
            Ok(None) => {
                return Err(DeployError::StackOperationFailed {
                    stack: name.clone(),
                    message: "Stack deploy failed (the stack disappeared while we were deploying it)"
                        .to_string(),
                }
                .with_monitor_errors(&name, &report.errors));
            }
            Err(e) => return Err(e.with_monitor_errors(&name, &report.errors)),
        };
        ctx.io
            .debug(format!("Stack {name} has completed updating"))
            .await;
        let stack_id = stack.stack_id().cloned().unwrap_or(self.state.stack_id);
        Ok(DeployStackResult::deployed(stack.outputs(), Some(stack_id)))
    }
}
