// ABOUTME: Entry point that drives stack lifecycles against resolved environments.
// ABOUTME: Owns the publisher cache, per-stack locks and the memoized cross-account decision.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::assets::{
    AssetManifest, AssetManifestBuilder, AssetPublisher, ManifestEntry, PublisherCache,
    PublisherFactory, PublisherOptions, determine_allow_cross_account_asset_publishing,
};
use crate::config::Settings;
use crate::deploy::{
    DeployContext, DeployError, DeployStackOptions, DeployStackResult, DestroyStackOptions,
    Hotswapper, NoHotswap, PrepareOutcome, RollbackReason, RollbackStackOptions,
    RollbackStackResult, StackDeployment, StackOperation, StackLocks, SubmitOutcome,
    destroy_stack, rollback_stack,
};
use crate::environment::{
    AccountCache, EnvironmentAccess, EnvironmentResources, ResolvedEnvironment, TargetEnvironment,
};
use crate::io::{IoHost, IoHostExt};
use crate::poll::Polling;
use crate::provider::{ResourceIdentifierSummary, SdkProvider, StackOps};
use crate::stack::{DeployedStack, StackArtifact};

/// How `stack_exists` reaches the stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StackExistsOptions {
    /// Try the lookup role before falling back to the read-only role.
    pub try_lookup_role: bool,
}

/// Drives deploy, rollback, destroy and asset publishing for stacks.
pub struct DeploymentCoordinator<P: SdkProvider, F: PublisherFactory> {
    environments: EnvironmentAccess<P>,
    io: Arc<dyn IoHost>,
    factory: F,
    publishers: PublisherCache<F::Publisher>,
    allow_cross_account: OnceCell<bool>,
    hotswapper: Arc<dyn Hotswapper>,
    polling: Polling,
    locks: StackLocks,
    rollback_max_iterations: u32,
}

impl<P: SdkProvider, F: PublisherFactory> std::fmt::Debug for DeploymentCoordinator<P, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentCoordinator")
            .field("environments", &self.environments)
            .field("publishers", &self.publishers)
            .field("polling", &self.polling)
            .field("rollback_max_iterations", &self.rollback_max_iterations)
            .finish()
    }
}

impl<P, F> DeploymentCoordinator<P, F>
where
    P: SdkProvider,
    F: PublisherFactory,
{
    pub fn new(provider: Arc<P>, factory: F, io: Arc<dyn IoHost>, settings: &Settings) -> Self {
        let account_cache = AccountCache::new(
            settings.account_cache.resolved_path(),
            settings.account_cache.max_entries,
        );
        Self {
            environments: EnvironmentAccess::new(
                provider,
                Arc::clone(&io),
                settings.toolkit_stack_name.clone(),
                account_cache,
            ),
            io,
            factory,
            publishers: PublisherCache::new(),
            allow_cross_account: OnceCell::new(),
            hotswapper: Arc::new(NoHotswap),
            polling: Polling::from_settings(&settings.polling),
            locks: StackLocks::new(),
            rollback_max_iterations: settings.rollback.max_iterations,
        }
    }

    /// Replace the polling schedules.
    pub fn with_polling(mut self, polling: Polling) -> Self {
        self.polling = polling;
        self
    }

    pub fn with_hotswapper(mut self, hotswapper: Arc<dyn Hotswapper>) -> Self {
        self.hotswapper = hotswapper;
        self
    }

    pub fn environments(&self) -> &EnvironmentAccess<P> {
        &self.environments
    }

    pub fn io(&self) -> &Arc<dyn IoHost> {
        &self.io
    }

    pub fn locks(&self) -> &StackLocks {
        &self.locks
    }

    pub fn publishers(&self) -> &PublisherCache<F::Publisher> {
        &self.publishers
    }

    // =========================================================================
    // Stack lifecycle
    // =========================================================================

    /// Deploy one stack.
    pub async fn deploy_stack(
        &self,
        artifact: &StackArtifact,
        options: DeployStackOptions,
    ) -> Result<DeployStackResult, DeployError> {
        let _lock = self.locks.acquire(artifact.name(), StackOperation::Deploy)?;
        self.deploy_stack_locked(artifact, options).await
    }

    /// Deploy, rolling back first when the stack is paused in a failed state.
    ///
    /// A paused stack or a replacement that needs rollback is recovered when
    /// `options.force` is set or the host confirms; the deployment is then
    /// retried once with rollback enabled.
    pub async fn deploy_and_recover(
        &self,
        artifact: &StackArtifact,
        options: DeployStackOptions,
    ) -> Result<DeployStackResult, DeployError> {
        let _lock = self.locks.acquire(artifact.name(), StackOperation::Deploy)?;
        let force = options.force;
        let mut options = options;

        for _ in 0..2 {
            let motivation = match self.deploy_stack_locked(artifact, options.clone()).await? {
                result @ DeployStackResult::Successful { .. } => return Ok(result),
                DeployStackResult::NeedsRollbackFirst { reason, status } => {
                    let motivation = match reason {
                        RollbackReason::Replacement => format!(
                            "Stack is in a paused fail state ({status}) and change includes a replacement which cannot be deployed with \"--no-rollback\""
                        ),
                        RollbackReason::NotNoRollback => format!(
                            "Stack is in a paused fail state ({status}) and command line arguments do not include \"--no-rollback\""
                        ),
                    };
                    self.confirm_recovery(&motivation, force, "Rolling back first").await?;
                    let rollback_options = RollbackStackOptions {
                        role_arn: options.role_arn.clone(),
                        ..RollbackStackOptions::default()
                    };
                    self.rollback_stack_locked(artifact, &rollback_options).await?;
                    motivation
                }
                DeployStackResult::ReplacementRequiresRollback => {
                    let motivation = "Change includes a replacement which cannot be deployed with \"--no-rollback\"".to_string();
                    self.confirm_recovery(&motivation, force, "Proceeding with regular deployment")
                        .await?;
                    motivation
                }
            };
            tracing::debug!(stack = artifact.name(), %motivation, "retrying deployment with rollback enabled");
            options.rollback = true;
        }

        Err(DeployError::StackOperationFailed {
            stack: artifact.name().to_string(),
            message: "This loop should have stabilized in 2 iterations, but didn't".to_string(),
        })
    }

    /// Deploy an import change set while holding the stack's import lock.
    pub(crate) async fn import_stack(
        &self,
        artifact: &StackArtifact,
        options: DeployStackOptions,
    ) -> Result<DeployStackResult, DeployError> {
        let _lock = self.locks.acquire(artifact.name(), StackOperation::Import)?;
        self.deploy_stack_locked(artifact, options).await
    }

    async fn confirm_recovery(
        &self,
        motivation: &str,
        force: bool,
        action: &str,
    ) -> Result<(), DeployError> {
        if force {
            self.io
                .warn(format!("{motivation}. {action} (--force)."))
                .await;
            return Ok(());
        }
        let confirmed = self
            .io
            .confirm(format!("{motivation}. Perform a regular deployment"), true)
            .await;
        if confirmed {
            Ok(())
        } else {
            Err(DeployError::Aborted)
        }
    }

    async fn deploy_stack_locked(
        &self,
        artifact: &StackArtifact,
        options: DeployStackOptions,
    ) -> Result<DeployStackResult, DeployError> {
        let name = artifact.name();
        let reuse_assets = options.reuse_assets.clone();
        let parallelism = options.asset_parallelism.max(1);
        let explicit_role = options.role_arn.clone();

        // Local validation precedes every remote call.
        let deployment = StackDeployment::new(artifact.clone(), options)?;

        let env = self.mutable_access(artifact).await?;
        let role_arn = self
            .execution_role(explicit_role.as_deref(), artifact, &env.resolved)
            .await?;
        let ctx = DeployContext::new(&env.sdk, &self.io, &self.polling);

        let deployment = deployment
            .with_execution_role(role_arn)
            .validate_bootstrap(&env.resources)
            .await?;

        // Missing parameter values fail before assets touch the environment.
        let supplied_by_assets: BTreeSet<String> = artifact
            .assets
            .iter()
            .filter(|asset| !reuse_assets.contains(&asset.id))
            .flat_map(|asset| asset.parameter_names().map(str::to_string))
            .collect();
        let deployed = deployment
            .check_parameters(ctx, &supplied_by_assets)
            .await?;

        let (manifest, asset_parameters) = self
            .build_asset_manifest(artifact, &env.resources, &reuse_assets)
            .await?;

        let prepared = match deployment
            .prepare(ctx, deployed, asset_parameters)
            .await?
        {
            PrepareOutcome::Skip(result) => return Ok(result),
            PrepareOutcome::Ready(prepared) => prepared,
        };

        self.publish_assets(&manifest, artifact, parallelism).await?;

        if let Some(result) = prepared.try_hotswap(ctx, self.hotswapper.as_ref()).await? {
            return Ok(result);
        }

        let result = match prepared.submit(ctx).await? {
            SubmitOutcome::Finished(result) => result,
            SubmitOutcome::Submitted(submitted) => submitted.stabilize(ctx).await?,
        };
        tracing::info!(stack = name, no_op = result.is_no_op(), "deployment finished");
        Ok(result)
    }

    /// Roll back a stack paused in a failed state.
    pub async fn rollback_stack(
        &self,
        artifact: &StackArtifact,
        options: RollbackStackOptions,
    ) -> Result<RollbackStackResult, DeployError> {
        let _lock = self.locks.acquire(artifact.name(), StackOperation::Rollback)?;
        self.rollback_stack_locked(artifact, &options).await
    }

    async fn rollback_stack_locked(
        &self,
        artifact: &StackArtifact,
        options: &RollbackStackOptions,
    ) -> Result<RollbackStackResult, DeployError> {
        let env = self.mutable_access(artifact).await?;
        let role_arn = self
            .execution_role(options.role_arn.as_deref(), artifact, &env.resolved)
            .await?;
        let ctx = DeployContext::new(&env.sdk, &self.io, &self.polling);
        rollback_stack(
            ctx,
            artifact,
            &env.resources,
            role_arn,
            options,
            self.rollback_max_iterations,
        )
        .await
    }

    /// Delete a stack. Absent stacks are a no-op.
    pub async fn destroy_stack(
        &self,
        artifact: &StackArtifact,
        options: DestroyStackOptions,
    ) -> Result<(), DeployError> {
        let _lock = self.locks.acquire(artifact.name(), StackOperation::Destroy)?;
        let env = self.mutable_access(artifact).await?;
        let role_arn = self
            .execution_role(options.role_arn.as_deref(), artifact, &env.resolved)
            .await?;
        let ctx = DeployContext::new(&env.sdk, &self.io, &self.polling);
        destroy_stack(ctx, artifact.name(), role_arn.as_deref()).await
    }

    pub async fn stack_exists(
        &self,
        artifact: &StackArtifact,
        options: StackExistsOptions,
    ) -> Result<bool, DeployError> {
        let name = artifact.name();
        let env = if options.try_lookup_role {
            self.environments
                .access_stack_for_lookup_best_effort(artifact)
                .await
        } else {
            self.environments
                .access_stack_for_read_only_stack_operations(artifact)
                .await
        }
        .map_err(|e| DeployError::environment(name, e))?;
        let stack = DeployedStack::lookup(env.sdk.as_ref(), name)
            .await
            .map_err(|e| DeployError::remote(name, e))?;
        Ok(stack.exists())
    }

    /// The template currently deployed, or `{}` when the stack does not exist.
    pub async fn read_current_template(&self, artifact: &StackArtifact) -> Result<Value, DeployError> {
        let name = artifact.name();
        self.io
            .debug(format!("Reading existing template for stack {name}."))
            .await;
        let env = self
            .environments
            .access_stack_for_lookup_best_effort(artifact)
            .await
            .map_err(|e| DeployError::environment(name, e))?;
        let stack = DeployedStack::lookup(env.sdk.as_ref(), name)
            .await
            .map_err(|e| DeployError::remote(name, e))?;
        stack
            .template(env.sdk.as_ref())
            .await
            .map_err(|e| DeployError::remote(name, e))
    }

    /// Identifier properties per resource type of the stack's template.
    pub async fn resource_identifier_summaries(
        &self,
        artifact: &StackArtifact,
    ) -> Result<Vec<ResourceIdentifierSummary>, DeployError> {
        let name = artifact.name();
        self.io
            .debug(format!("Retrieving template summary for stack {name}."))
            .await;
        // The deploy role can read templates the lookup role may not decrypt.
        let env = self
            .environments
            .access_stack_for_read_only_stack_operations(artifact)
            .await
            .map_err(|e| DeployError::environment(name, e))?;
        let summaries = env
            .sdk
            .get_template_summary(&artifact.template)
            .await
            .map_err(|e| DeployError::remote(name, e))?;
        if summaries.is_empty() {
            self.io
                .debug("GetTemplateSummary API call did not return \"ResourceIdentifierSummaries\"".to_string())
                .await;
        }
        Ok(summaries)
    }

    // =========================================================================
    // Assets
    // =========================================================================

    /// Build the asset manifest for a stack and the parameters pointing at its assets.
    pub async fn prepare_assets(
        &self,
        artifact: &StackArtifact,
        reuse_assets: &[String],
    ) -> Result<(AssetManifest, BTreeMap<String, String>), DeployError> {
        let env = self.mutable_access(artifact).await?;
        self.build_asset_manifest(artifact, &env.resources, reuse_assets)
            .await
    }

    async fn build_asset_manifest(
        &self,
        artifact: &StackArtifact,
        resources: &EnvironmentResources<P::Sdk>,
        reuse_assets: &[String],
    ) -> Result<(AssetManifest, BTreeMap<String, String>), DeployError> {
        let mut builder = AssetManifestBuilder::new(&artifact.assembly_dir);
        let parameters = builder
            .add_stack_assets(artifact, resources, reuse_assets)
            .await
            .map_err(|e| DeployError::asset(artifact.name(), e))?;
        Ok((builder.into_manifest(), parameters))
    }

    /// Build one manifest entry with the manifest's cached publisher.
    pub async fn build_single_asset(
        &self,
        manifest: &AssetManifest,
        entry: &ManifestEntry,
        artifact: &StackArtifact,
    ) -> Result<(), DeployError> {
        let env = self.mutable_access(artifact).await?;
        env.resources
            .validate_version(
                artifact.requires_bootstrap_stack_version,
                artifact.bootstrap_stack_version_ssm_parameter.as_deref(),
            )
            .await
            .map_err(|e| DeployError::environment(artifact.name(), e))?;
        let publisher = self.cached_publisher(manifest, artifact).await?;
        build_entry(publisher.as_ref(), entry).await
    }

    /// Publish one manifest entry with the manifest's cached publisher.
    pub async fn publish_single_asset(
        &self,
        manifest: &AssetManifest,
        entry: &ManifestEntry,
        artifact: &StackArtifact,
    ) -> Result<(), DeployError> {
        let publisher = self.cached_publisher(manifest, artifact).await?;
        publish_entry(publisher.as_ref(), entry).await
    }

    pub async fn is_single_asset_published(
        &self,
        manifest: &AssetManifest,
        entry: &ManifestEntry,
        artifact: &StackArtifact,
    ) -> Result<bool, DeployError> {
        let publisher = self.cached_publisher(manifest, artifact).await?;
        Ok(publisher.is_entry_published(entry).await?)
    }

    /// Build and publish every entry of a manifest that is not already published.
    ///
    /// At most `parallelism` entries are in flight at once.
    pub async fn publish_assets(
        &self,
        manifest: &AssetManifest,
        artifact: &StackArtifact,
        parallelism: usize,
    ) -> Result<(), DeployError> {
        if manifest.is_empty() {
            return Ok(());
        }
        let publisher = self.cached_publisher(manifest, artifact).await?;
        let publisher = publisher.as_ref();
        stream::iter(manifest.entries())
            .map(|entry| build_and_publish(publisher, entry))
            .buffer_unordered(parallelism.max(1))
            .try_collect::<Vec<()>>()
            .await?;
        Ok(())
    }

    async fn cached_publisher(
        &self,
        manifest: &AssetManifest,
        artifact: &StackArtifact,
    ) -> Result<Arc<F::Publisher>, DeployError> {
        let resolved = self
            .environments
            .resolve_environment(&artifact.environment)
            .await
            .map_err(|e| DeployError::environment(artifact.name(), e))?;
        let allow_cross_account = self.allow_cross_account(artifact).await?;
        let options = PublisherOptions {
            allow_cross_account,
            build_assets: true,
        };
        Ok(self.publishers.get_or_create(manifest, || {
            self.factory.create(manifest, &resolved, options)
        }))
    }

    /// Whether assets may go to other accounts, decided once per coordinator.
    async fn allow_cross_account(&self, artifact: &StackArtifact) -> Result<bool, DeployError> {
        let allowed = self
            .allow_cross_account
            .get_or_try_init(|| async {
                let env = self
                    .environments
                    .access_stack_for_read_only_stack_operations(artifact)
                    .await
                    .map_err(|e| DeployError::environment(artifact.name(), e))?;
                Ok::<_, DeployError>(
                    determine_allow_cross_account_asset_publishing(
                        env.sdk.as_ref(),
                        self.io.as_ref(),
                        self.environments.toolkit_stack_name(),
                    )
                    .await,
                )
            })
            .await?;
        Ok(*allowed)
    }

    // =========================================================================
    // Environment helpers
    // =========================================================================

    async fn mutable_access(
        &self,
        artifact: &StackArtifact,
    ) -> Result<TargetEnvironment<P::Sdk>, DeployError> {
        self.environments
            .access_stack_for_mutable_stack_operations(artifact)
            .await
            .map_err(|e| DeployError::environment(artifact.name(), e))
    }

    /// The execution role to pass to the service, placeholders replaced.
    async fn execution_role(
        &self,
        explicit: Option<&str>,
        artifact: &StackArtifact,
        environment: &ResolvedEnvironment,
    ) -> Result<Option<String>, DeployError> {
        let Some(role) = explicit.or(artifact.execution_role_arn.as_deref()) else {
            return Ok(None);
        };
        let role = self
            .environments
            .replace_placeholders(role, environment)
            .await
            .map_err(|e| DeployError::environment(artifact.name(), e))?;
        Ok(Some(role))
    }
}

async fn build_and_publish<A>(publisher: &A, entry: &ManifestEntry) -> Result<(), DeployError>
where
    A: AssetPublisher + ?Sized,
{
    if publisher.is_entry_published(entry).await? {
        tracing::debug!(asset = %entry.display_name(), "asset already published");
        return Ok(());
    }
    build_entry(publisher, entry).await?;
    publish_entry(publisher, entry).await
}

async fn build_entry<A>(publisher: &A, entry: &ManifestEntry) -> Result<(), DeployError>
where
    A: AssetPublisher + ?Sized,
{
    publisher.build_entry(entry).await?;
    if publisher.has_failures() {
        return Err(DeployError::AssetBuildFailed {
            asset: entry.display_name(),
        });
    }
    Ok(())
}

async fn publish_entry<A>(publisher: &A, entry: &ManifestEntry) -> Result<(), DeployError>
where
    A: AssetPublisher + ?Sized,
{
    publisher.publish_entry(entry).await?;
    if publisher.has_failures() {
        return Err(DeployError::AssetPublishFailed {
            asset: entry.display_name(),
        });
    }
    Ok(())
}
