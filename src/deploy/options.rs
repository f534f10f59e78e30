// ABOUTME: Options controlling how a stack is deployed, rolled back or destroyed.
// ABOUTME: Deployment method and hotswap mode selection.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::{MethodSetting, Settings};
use crate::provider::ResourceToImport;

/// Default name for change sets created by this tool.
pub const DEFAULT_CHANGE_SET_NAME: &str = "cdk-deploy-change-set";

/// How the template is submitted to the provisioning service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentMethod {
    /// Create or update the stack directly.
    Direct,
    /// Create a change set and (optionally) execute it.
    ChangeSet {
        execute: bool,
        name: String,
        import_existing_resources: bool,
    },
}

impl Default for DeploymentMethod {
    fn default() -> Self {
        DeploymentMethod::ChangeSet {
            execute: true,
            name: DEFAULT_CHANGE_SET_NAME.to_string(),
            import_existing_resources: false,
        }
    }
}

impl DeploymentMethod {
    /// Whether this only creates a change set for later review.
    pub fn is_review_only(&self) -> bool {
        matches!(self, DeploymentMethod::ChangeSet { execute: false, .. })
    }
}

impl From<MethodSetting> for DeploymentMethod {
    fn from(setting: MethodSetting) -> Self {
        match setting {
            MethodSetting::Direct => DeploymentMethod::Direct,
            MethodSetting::ChangeSet => DeploymentMethod::default(),
        }
    }
}

/// Whether to try a fast in-place update before a full deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HotswapMode {
    /// Never hotswap.
    #[default]
    FullDeployment,
    /// Hotswap when possible, otherwise deploy normally.
    FallBack,
    /// Hotswap when possible, otherwise skip.
    HotswapOnly,
}

/// Options for a single stack deployment.
#[derive(Debug, Clone)]
pub struct DeployStackOptions {
    /// Execution role for the provisioning service. Placeholders are resolved.
    pub role_arn: Option<String>,
    /// Explicit parameter values.
    pub parameters: BTreeMap<String, String>,
    /// Reuse values from the deployed stack for parameters without an override.
    pub use_previous_parameters: bool,
    pub method: DeploymentMethod,
    /// When false, failures pause the stack instead of rolling back.
    pub rollback: bool,
    pub hotswap: HotswapMode,
    /// Deploy even when nothing appears to have changed.
    pub force: bool,
    /// Asset ids whose previously published copies are reused.
    pub reuse_assets: Vec<String>,
    /// Maximum assets built or published at once.
    pub asset_parallelism: usize,
    /// Template to submit instead of the artifact's own.
    pub override_template: Option<Value>,
    /// Resources bound to existing physical resources by this deployment.
    pub resources_to_import: Vec<ResourceToImport>,
    /// Stack tags; defaults to the artifact's tags.
    pub tags: Option<BTreeMap<String, String>>,
}

impl Default for DeployStackOptions {
    fn default() -> Self {
        Self {
            role_arn: None,
            parameters: BTreeMap::new(),
            use_previous_parameters: true,
            method: DeploymentMethod::default(),
            rollback: true,
            hotswap: HotswapMode::default(),
            force: false,
            reuse_assets: Vec::new(),
            asset_parallelism: 4,
            override_template: None,
            resources_to_import: Vec::new(),
            tags: None,
        }
    }
}

impl DeployStackOptions {
    /// Options seeded from configured deployment defaults and asset concurrency.
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = &settings.deployment;
        Self {
            method: defaults.method.into(),
            rollback: defaults.rollback,
            use_previous_parameters: defaults.use_previous_parameters,
            asset_parallelism: settings.assets.concurrency,
            ..Self::default()
        }
    }
}

/// Options for rolling back a stack paused in a failed state.
#[derive(Debug, Clone)]
pub struct RollbackStackOptions {
    pub role_arn: Option<String>,
    /// Skip whichever resources failed to roll back.
    pub orphan_failed_resources: bool,
    /// Specific resources to skip.
    pub orphan_logical_ids: Vec<String>,
    pub validate_bootstrap_version: bool,
}

impl Default for RollbackStackOptions {
    fn default() -> Self {
        Self {
            role_arn: None,
            orphan_failed_resources: false,
            orphan_logical_ids: Vec::new(),
            validate_bootstrap_version: true,
        }
    }
}

/// Options for destroying a stack.
#[derive(Debug, Clone, Default)]
pub struct DestroyStackOptions {
    pub role_arn: Option<String>,
}
