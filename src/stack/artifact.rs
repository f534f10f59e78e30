// ABOUTME: The synthesized stack artifact handed to the coordinator.
// ABOUTME: Template body, target environment, assets, roles and bootstrap requirements.

use crate::types::StackName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Placeholder account for environment-agnostic stacks.
pub const UNKNOWN_ACCOUNT: &str = "unknown-account";
/// Placeholder region for environment-agnostic stacks.
pub const UNKNOWN_REGION: &str = "unknown-region";

/// Target account and region of a stack.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Environment {
    pub account: String,
    pub region: String,
}

impl Environment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    /// An environment resolved at deploy time from the default credentials.
    pub fn agnostic() -> Self {
        Self::new(UNKNOWN_ACCOUNT, UNKNOWN_REGION)
    }

    pub fn is_account_agnostic(&self) -> bool {
        self.account == UNKNOWN_ACCOUNT
    }

    pub fn is_region_agnostic(&self) -> bool {
        self.region == UNKNOWN_REGION
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::agnostic()
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "aws://{}/{}", self.account, self.region)
    }
}

/// A read-only role used for context lookups and template reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRole {
    pub arn: String,
    #[serde(default)]
    pub assume_role_external_id: Option<String>,
    #[serde(default)]
    pub requires_bootstrap_stack_version: Option<u32>,
    #[serde(default)]
    pub bootstrap_stack_version_ssm_parameter: Option<String>,
}

/// Metadata describing one asset of a stack.
///
/// File assets use `packaging` `file` or `zip` and the `s3_*` parameters;
/// container images use `container-image` and the image fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    pub id: String,
    pub source_hash: String,
    /// Source path, relative to the assembly directory.
    pub path: String,
    pub packaging: String,

    #[serde(default)]
    pub s3_bucket_parameter: Option<String>,
    #[serde(default)]
    pub s3_key_parameter: Option<String>,
    #[serde(default)]
    pub artifact_hash_parameter: Option<String>,

    #[serde(default)]
    pub image_name_parameter: Option<String>,
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default)]
    pub image_tag: Option<String>,
    #[serde(default)]
    pub build_args: BTreeMap<String, String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
}

impl AssetMetadata {
    /// Names of the stack parameters this asset fills in.
    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        [
            &self.s3_bucket_parameter,
            &self.s3_key_parameter,
            &self.artifact_hash_parameter,
            &self.image_name_parameter,
        ]
        .into_iter()
        .filter_map(|name| name.as_deref())
    }

    /// Metadata for a file asset packaged as `packaging`.
    pub fn file(id: &str, source_hash: &str, path: &str, packaging: &str) -> Self {
        Self {
            id: id.to_string(),
            source_hash: source_hash.to_string(),
            path: path.to_string(),
            packaging: packaging.to_string(),
            s3_bucket_parameter: Some(format!("AssetParameters{id}S3Bucket")),
            s3_key_parameter: Some(format!("AssetParameters{id}S3VersionKey")),
            artifact_hash_parameter: Some(format!("AssetParameters{id}ArtifactHash")),
            image_name_parameter: None,
            repository_name: None,
            image_tag: None,
            build_args: BTreeMap::new(),
            target: None,
            file: None,
            platform: None,
        }
    }

    /// Metadata for a container image asset built from `path`.
    pub fn container_image(id: &str, source_hash: &str, path: &str) -> Self {
        Self {
            id: id.to_string(),
            source_hash: source_hash.to_string(),
            path: path.to_string(),
            packaging: "container-image".to_string(),
            s3_bucket_parameter: None,
            s3_key_parameter: None,
            artifact_hash_parameter: None,
            image_name_parameter: Some(format!("AssetParameters{id}ImageName")),
            repository_name: None,
            image_tag: None,
            build_args: BTreeMap::new(),
            target: None,
            file: None,
            platform: None,
        }
    }
}

/// A synthesized stack ready for deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackArtifact {
    pub stack_name: StackName,
    pub template: Value,
    #[serde(default)]
    pub assets: Vec<AssetMetadata>,
    #[serde(default)]
    pub environment: Environment,
    /// Names of stacks this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub requires_bootstrap_stack_version: Option<u32>,
    #[serde(default)]
    pub bootstrap_stack_version_ssm_parameter: Option<String>,
    /// Role the deployment assumes (deploy role).
    #[serde(default)]
    pub assume_role_arn: Option<String>,
    #[serde(default)]
    pub assume_role_external_id: Option<String>,
    /// Role the provisioning service uses to apply the template.
    #[serde(default)]
    pub execution_role_arn: Option<String>,
    #[serde(default)]
    pub lookup_role: Option<LookupRole>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub termination_protection: bool,
    #[serde(default)]
    pub assembly_dir: PathBuf,
}

impl StackArtifact {
    /// A minimal artifact targeting the given environment.
    pub fn new(stack_name: StackName, template: Value, environment: Environment) -> Self {
        Self {
            stack_name,
            template,
            assets: Vec::new(),
            environment,
            dependencies: Vec::new(),
            requires_bootstrap_stack_version: None,
            bootstrap_stack_version_ssm_parameter: None,
            assume_role_arn: None,
            assume_role_external_id: None,
            execution_role_arn: None,
            lookup_role: None,
            tags: BTreeMap::new(),
            termination_protection: false,
            assembly_dir: PathBuf::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn name(&self) -> &str {
        self.stack_name.as_str()
    }

    /// Absolute location of an asset source path.
    pub fn asset_path(&self, relative: &str) -> PathBuf {
        let path = Path::new(relative);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.assembly_dir.join(path)
        }
    }
}
