// ABOUTME: Per-environment bootstrap resources: toolkit info, version parameters, repositories.
// ABOUTME: Caches live in a registry keyed by account and region for the coordinator's lifetime.

use super::access::ResolvedEnvironment;
use super::error::{
    BootstrapStackNotFoundSnafu, BootstrapVersionTooOldSnafu, EnvironmentError,
    RepositoryUriMissingSnafu, VersionParameterNotFoundSnafu, VersionParameterNotNumberSnafu,
    VersionParameterUnreadableSnafu,
};
use super::toolkit::ToolkitInfo;
use crate::io::{IoHost, IoHostExt};
use crate::provider::{ProvisionError, ProvisioningSdk};
use parking_lot::Mutex;
use snafu::{IntoError, OptionExt, ensure};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Bootstrap stacks older than this have no version parameter and no permission to read it.
pub const BOOTSTRAP_VERSION_BEFORE_SSM_PARAMETER: u32 = 5;

#[derive(Debug, Default)]
struct EnvironmentCache {
    toolkit_info: OnceCell<ToolkitInfo>,
    ssm_parameters: Mutex<HashMap<String, u32>>,
}

/// Owns the per-environment caches.
#[derive(Debug)]
pub struct EnvironmentResourcesRegistry {
    toolkit_stack_name: String,
    caches: Mutex<HashMap<String, Arc<EnvironmentCache>>>,
}

impl EnvironmentResourcesRegistry {
    pub fn new(toolkit_stack_name: impl Into<String>) -> Self {
        Self {
            toolkit_stack_name: toolkit_stack_name.into(),
            caches: Mutex::new(HashMap::new()),
        }
    }

    pub fn toolkit_stack_name(&self) -> &str {
        &self.toolkit_stack_name
    }

    /// Resources of one environment, sharing that environment's cache.
    pub fn for_environment<S>(
        &self,
        environment: &ResolvedEnvironment,
        sdk: Arc<S>,
        io: Arc<dyn IoHost>,
    ) -> EnvironmentResources<S> {
        let key = format!("{}:{}", environment.account, environment.region);
        let cache = Arc::clone(self.caches.lock().entry(key).or_default());
        EnvironmentResources {
            environment: environment.clone(),
            sdk,
            io,
            cache,
            toolkit_stack_name: self.toolkit_stack_name.clone(),
        }
    }
}

/// Bootstrap resources of a single environment.
pub struct EnvironmentResources<S> {
    environment: ResolvedEnvironment,
    sdk: Arc<S>,
    io: Arc<dyn IoHost>,
    cache: Arc<EnvironmentCache>,
    toolkit_stack_name: String,
}

impl<S> Clone for EnvironmentResources<S> {
    fn clone(&self) -> Self {
        Self {
            environment: self.environment.clone(),
            sdk: Arc::clone(&self.sdk),
            io: Arc::clone(&self.io),
            cache: Arc::clone(&self.cache),
            toolkit_stack_name: self.toolkit_stack_name.clone(),
        }
    }
}

impl<S> std::fmt::Debug for EnvironmentResources<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentResources")
            .field("environment", &self.environment)
            .field("toolkit_stack_name", &self.toolkit_stack_name)
            .finish()
    }
}

impl<S> EnvironmentResources<S>
where
    S: ProvisioningSdk + 'static,
{
    pub fn environment(&self) -> &ResolvedEnvironment {
        &self.environment
    }

    /// The bootstrap stack, read once per environment.
    pub async fn lookup_toolkit(&self) -> Result<&ToolkitInfo, EnvironmentError> {
        let info = self
            .cache
            .toolkit_info
            .get_or_try_init(|| ToolkitInfo::lookup(self.sdk.as_ref(), &self.toolkit_stack_name))
            .await?;
        Ok(info)
    }

    /// Check the deployed bootstrap version against `expected`.
    ///
    /// The version parameter is authoritative. Bootstrap stacks older than
    /// [`BOOTSTRAP_VERSION_BEFORE_SSM_PARAMETER`] cannot grant read access to it,
    /// so access-denied falls back to the version output of the stack.
    pub async fn validate_version(
        &self,
        expected: Option<u32>,
        ssm_parameter: Option<&str>,
    ) -> Result<(), EnvironmentError> {
        let Some(expected) = expected else {
            return Ok(());
        };

        let Some(parameter) = ssm_parameter else {
            let toolkit = self.found_toolkit().await?;
            return validate(expected, toolkit.version());
        };

        match self.version_from_ssm_parameter(parameter).await {
            Ok(version) => validate(expected, version),
            Err(EnvironmentError::Remote {
                source: ProvisionError::AccessDenied(message),
            }) => {
                let toolkit = self.lookup_toolkit().await?;
                if toolkit.found() && toolkit.version() < BOOTSTRAP_VERSION_BEFORE_SSM_PARAMETER {
                    self.io
                        .warn(format!(
                            "Could not read SSM parameter {parameter}: {message}, falling back to version from {}",
                            toolkit.stack_name()
                        ))
                        .await;
                    return validate(expected, toolkit.version());
                }
                Err(VersionParameterUnreadableSnafu {
                    parameter,
                    required: expected,
                }
                .into_error(ProvisionError::AccessDenied(message)))
            }
            Err(e) => Err(e),
        }
    }

    /// Read a numeric version parameter, once per environment and name.
    pub async fn version_from_ssm_parameter(
        &self,
        parameter: &str,
    ) -> Result<u32, EnvironmentError> {
        if let Some(version) = self.cache.ssm_parameters.lock().get(parameter) {
            return Ok(*version);
        }

        let value = match self.sdk.get_parameter(parameter).await {
            Ok(value) => value,
            Err(ProvisionError::ParameterNotFound(_)) => {
                return VersionParameterNotFoundSnafu { parameter }.fail();
            }
            Err(e) => return Err(e.into()),
        };
        let version: u32 = value
            .trim()
            .parse()
            .ok()
            .context(VersionParameterNotNumberSnafu {
                parameter,
                value: value.clone(),
            })?;

        self.cache
            .ssm_parameters
            .lock()
            .insert(parameter.to_string(), version);
        Ok(version)
    }

    /// Make sure an image repository exists and return its URI.
    pub async fn prepare_image_repository(
        &self,
        repository_name: &str,
    ) -> Result<String, EnvironmentError> {
        self.io
            .debug(format!("{repository_name}: checking if image repository already exists"))
            .await;
        match self.sdk.describe_repository(repository_name).await {
            Ok(Some(uri)) => return Ok(uri),
            Ok(None) | Err(ProvisionError::RepositoryNotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.io
            .debug(format!("{repository_name}: creating image repository"))
            .await;
        let tags = BTreeMap::from([("awscdk:asset".to_string(), "true".to_string())]);
        let uri = self
            .sdk
            .create_repository(repository_name, &tags)
            .await?
            .context(RepositoryUriMissingSnafu {
                repository: repository_name,
            })?;

        self.io
            .debug(format!("{repository_name}: enable image scanning"))
            .await;
        self.sdk.enable_scan_on_push(repository_name).await?;
        Ok(uri)
    }

    async fn found_toolkit(&self) -> Result<&ToolkitInfo, EnvironmentError> {
        let toolkit = self.lookup_toolkit().await?;
        ensure!(
            toolkit.found(),
            BootstrapStackNotFoundSnafu {
                stack_name: toolkit.stack_name(),
                environment: self.environment.to_string(),
            }
        );
        Ok(toolkit)
    }
}

fn validate(expected: u32, found: u32) -> Result<(), EnvironmentError> {
    ensure!(
        found >= expected,
        BootstrapVersionTooOldSnafu {
            required: expected,
            found,
        }
    );
    Ok(())
}
