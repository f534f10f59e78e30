// ABOUTME: Environment access for stack operations, lookups and asset publishing.
// ABOUTME: Resolves agnostic environments, substitutes placeholders and caches clients.

use super::account_cache::AccountCache;
use super::error::{EnvironmentError, LookupRoleVersionTooOldSnafu, SdkAccessSnafu};
use super::placeholders::{needs_partition, replace_env_placeholders};
use super::resources::{EnvironmentResources, EnvironmentResourcesRegistry};
use crate::io::{IoHost, IoHostExt};
use crate::provider::{AccessMode, Account, AssumeRole, SdkForEnvironment, SdkProvider};
use crate::stack::{Environment, StackArtifact};
use parking_lot::Mutex;
use snafu::{ResultExt, ensure};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

const DEFAULT_PARTITION: &str = "aws";

/// A concrete account and region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedEnvironment {
    pub account: String,
    pub region: String,
}

impl ResolvedEnvironment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

impl std::fmt::Display for ResolvedEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "aws://{}/{}", self.account, self.region)
    }
}

/// Everything needed to act on one stack's environment.
pub struct TargetEnvironment<S> {
    pub sdk: Arc<S>,
    pub resolved: ResolvedEnvironment,
    pub resources: EnvironmentResources<S>,
    pub did_assume_role: bool,
    /// A role was requested but the default credentials are in use.
    pub is_fallback_credentials: bool,
}

impl<S> std::fmt::Debug for TargetEnvironment<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetEnvironment")
            .field("resolved", &self.resolved)
            .field("did_assume_role", &self.did_assume_role)
            .field("is_fallback_credentials", &self.is_fallback_credentials)
            .finish()
    }
}

type SdkSlot<S> = Arc<OnceCell<SdkForEnvironment<S>>>;

/// Hands out clients and bootstrap resources per environment.
pub struct EnvironmentAccess<P: SdkProvider> {
    provider: Arc<P>,
    io: Arc<dyn IoHost>,
    account_cache: AccountCache,
    default_account: OnceCell<Option<Account>>,
    sdk_cache: Mutex<HashMap<String, SdkSlot<P::Sdk>>>,
    resources: EnvironmentResourcesRegistry,
}

impl<P: SdkProvider> std::fmt::Debug for EnvironmentAccess<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentAccess")
            .field("toolkit_stack_name", &self.resources.toolkit_stack_name())
            .field("account_cache", &self.account_cache)
            .finish()
    }
}

impl<P: SdkProvider> EnvironmentAccess<P> {
    pub fn new(
        provider: Arc<P>,
        io: Arc<dyn IoHost>,
        toolkit_stack_name: impl Into<String>,
        account_cache: AccountCache,
    ) -> Self {
        Self {
            provider,
            io,
            account_cache,
            default_account: OnceCell::new(),
            sdk_cache: Mutex::new(HashMap::new()),
            resources: EnvironmentResourcesRegistry::new(toolkit_stack_name),
        }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    pub fn toolkit_stack_name(&self) -> &str {
        self.resources.toolkit_stack_name()
    }

    /// The account of the default credentials, looked up once.
    pub async fn default_account(&self) -> Result<Option<Account>, EnvironmentError> {
        let account = self
            .default_account
            .get_or_try_init(|| async {
                let lookup = || async {
                    self.provider
                        .lookup_default_account()
                        .await
                        .map_err(EnvironmentError::from)
                };
                match self.provider.default_access_key_id() {
                    Some(key) => self.account_cache.fetch(&key, lookup).await,
                    None => lookup().await,
                }
            })
            .await?;
        Ok(account.clone())
    }

    /// Replace `unknown-account` / `unknown-region` with concrete values.
    pub async fn resolve_environment(
        &self,
        environment: &Environment,
    ) -> Result<ResolvedEnvironment, EnvironmentError> {
        let region = if environment.is_region_agnostic() {
            self.provider.default_region()
        } else {
            environment.region.clone()
        };
        let account = if environment.is_account_agnostic() {
            self.default_account()
                .await?
                .map(|a| a.account_id)
                .ok_or(EnvironmentError::UnresolvedAccount)?
        } else {
            environment.account.clone()
        };
        Ok(ResolvedEnvironment { account, region })
    }

    /// Substitute environment placeholders in `value`.
    pub async fn replace_placeholders(
        &self,
        value: &str,
        environment: &ResolvedEnvironment,
    ) -> Result<String, EnvironmentError> {
        let partition = if needs_partition(value) {
            self.default_account()
                .await
                .ok()
                .flatten()
                .map(|a| a.partition)
                .unwrap_or_else(|| DEFAULT_PARTITION.to_string())
        } else {
            DEFAULT_PARTITION.to_string()
        };
        Ok(replace_env_placeholders(
            value,
            &environment.account,
            &environment.region,
            &partition,
        ))
    }

    pub async fn access_stack_for_read_only_stack_operations(
        &self,
        stack: &StackArtifact,
    ) -> Result<TargetEnvironment<P::Sdk>, EnvironmentError> {
        self.access_stack_for_stack_operations(stack, AccessMode::ForReading)
            .await
    }

    pub async fn access_stack_for_mutable_stack_operations(
        &self,
        stack: &StackArtifact,
    ) -> Result<TargetEnvironment<P::Sdk>, EnvironmentError> {
        self.access_stack_for_stack_operations(stack, AccessMode::ForWriting)
            .await
    }

    /// Access through the lookup role, checking its bootstrap requirement.
    pub async fn access_stack_for_lookup(
        &self,
        stack: &StackArtifact,
    ) -> Result<TargetEnvironment<P::Sdk>, EnvironmentError> {
        let lookup_role = stack.lookup_role.as_ref();
        let target = self
            .prepare_sdk(
                &stack.environment,
                AccessMode::ForReading,
                lookup_role.map(|r| r.arn.as_str()),
                lookup_role.and_then(|r| r.assume_role_external_id.as_deref()),
            )
            .await?;

        if let Some(role) = lookup_role
            && target.did_assume_role
            && let Some(required) = role.requires_bootstrap_stack_version
        {
            let found = match &role.bootstrap_stack_version_ssm_parameter {
                Some(parameter) => target.resources.version_from_ssm_parameter(parameter).await?,
                None => target.resources.lookup_toolkit().await?.version(),
            };
            ensure!(
                found >= required,
                LookupRoleVersionTooOldSnafu { required, found }
            );
        }

        if target.is_fallback_credentials
            && let Some(role) = lookup_role
        {
            self.io
                .warn(format!(
                    "Lookup role {} was not assumed. Proceeding with default credentials.",
                    role.arn
                ))
                .await;
        }
        Ok(target)
    }

    /// Lookup access, falling back to read-only stack access with a warning.
    pub async fn access_stack_for_lookup_best_effort(
        &self,
        stack: &StackArtifact,
    ) -> Result<TargetEnvironment<P::Sdk>, EnvironmentError> {
        match self.access_stack_for_lookup(stack).await {
            Ok(target) => Ok(target),
            Err(e) => {
                self.io.warn(e.to_string()).await;
                self.access_stack_for_read_only_stack_operations(stack).await
            }
        }
    }

    async fn access_stack_for_stack_operations(
        &self,
        stack: &StackArtifact,
        mode: AccessMode,
    ) -> Result<TargetEnvironment<P::Sdk>, EnvironmentError> {
        self.prepare_sdk(
            &stack.environment,
            mode,
            stack.assume_role_arn.as_deref(),
            stack.assume_role_external_id.as_deref(),
        )
        .await
    }

    async fn prepare_sdk(
        &self,
        environment: &Environment,
        mode: AccessMode,
        role_arn: Option<&str>,
        external_id: Option<&str>,
    ) -> Result<TargetEnvironment<P::Sdk>, EnvironmentError> {
        let resolved = self.resolve_environment(environment).await?;
        let role = match role_arn {
            Some(arn) => Some(AssumeRole {
                role_arn: self.replace_placeholders(arn, &resolved).await?,
                external_id: external_id.map(str::to_string),
            }),
            None => None,
        };

        let sdk = self.cached_sdk_for_environment(&resolved, mode, role.as_ref()).await?;
        let resources =
            self.resources
                .for_environment(&resolved, Arc::clone(&sdk.sdk), Arc::clone(&self.io));
        Ok(TargetEnvironment {
            sdk: sdk.sdk,
            resolved,
            resources,
            did_assume_role: sdk.did_assume_role,
            is_fallback_credentials: role.is_some() && !sdk.did_assume_role,
        })
    }

    async fn cached_sdk_for_environment(
        &self,
        environment: &ResolvedEnvironment,
        mode: AccessMode,
        role: Option<&AssumeRole>,
    ) -> Result<SdkForEnvironment<P::Sdk>, EnvironmentError> {
        let key = [
            environment.account.as_str(),
            environment.region.as_str(),
            &mode.to_string(),
            role.map(|r| r.role_arn.as_str()).unwrap_or_default(),
            role.and_then(|r| r.external_id.as_deref()).unwrap_or_default(),
        ]
        .join(":");

        let slot = Arc::clone(self.sdk_cache.lock().entry(key).or_default());
        let sdk = slot
            .get_or_try_init(|| async {
                self.provider
                    .for_environment(environment, mode, role)
                    .await
                    .context(SdkAccessSnafu {
                        environment: environment.to_string(),
                    })
            })
            .await?;
        Ok(sdk.clone())
    }
}
