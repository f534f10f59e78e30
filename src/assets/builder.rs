// ABOUTME: Turns stack asset metadata into manifest entries and stack parameters.
// ABOUTME: File assets land under assets/ in the staging bucket; images in a shared repository.

use super::error::AssetError;
use super::manifest::{
    AssetManifest, FileDestination, FilePackaging, FileSource, ImageDestination, ImageSource,
    ManifestEntry,
};
use crate::environment::{EnvironmentResources, ToolkitInfo};
use crate::provider::ProvisioningSdk;
use crate::stack::{AssetMetadata, StackArtifact};
use std::collections::BTreeMap;
use std::path::Path;

/// Separates the key prefix from the base name in the key parameter.
const ASSET_PREFIX_SEPARATOR: &str = "||";

/// Object key of a file asset, and the prefix it lives under.
///
/// The prefix is `assets/` when the id equals the hash, otherwise `assets/<id>/`.
pub fn file_asset_key(asset: &AssetMetadata, packaging: FilePackaging) -> (String, String) {
    let extension = match packaging {
        FilePackaging::ZipDirectory => ".zip".to_string(),
        FilePackaging::File => Path::new(&asset.path)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default(),
    };
    let base_name = format!("{}{}", asset.source_hash, extension);
    let prefix = if asset.id == asset.source_hash {
        "assets/".to_string()
    } else {
        format!("assets/{}/", asset.id)
    };
    (prefix, base_name)
}

/// Repository for an image asset without an explicit one.
pub fn image_repository_name(asset_id: &str) -> String {
    let sanitized: String = asset_id
        .chars()
        .map(|c| if c == ':' || c == '/' { '-' } else { c })
        .collect();
    format!("cdk/{}", sanitized.to_lowercase())
}

/// Accumulates manifest entries for a deployment.
#[derive(Debug)]
pub struct AssetManifestBuilder {
    manifest: AssetManifest,
}

impl AssetManifestBuilder {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            manifest: AssetManifest::new(directory.as_ref()),
        }
    }

    pub fn manifest(&self) -> &AssetManifest {
        &self.manifest
    }

    pub fn into_manifest(self) -> AssetManifest {
        self.manifest
    }

    pub fn add_file_asset(&mut self, id: &str, source: FileSource, destination: FileDestination) {
        self.manifest.insert(ManifestEntry::File {
            id: id.to_string(),
            source,
            destination,
        });
    }

    pub fn add_image_asset(&mut self, id: &str, source: ImageSource, destination: ImageDestination) {
        self.manifest.insert(ManifestEntry::Image {
            id: id.to_string(),
            source,
            destination,
        });
    }

    /// Add every asset of `stack` not listed in `reuse` and return the stack
    /// parameters that point at them.
    pub async fn add_stack_assets<S>(
        &mut self,
        stack: &StackArtifact,
        resources: &EnvironmentResources<S>,
        reuse: &[String],
    ) -> Result<BTreeMap<String, String>, AssetError>
    where
        S: ProvisioningSdk + 'static,
    {
        let mut params = BTreeMap::new();
        if stack.assets.is_empty() {
            return Ok(params);
        }

        let toolkit = resources.lookup_toolkit().await?;
        if !toolkit.found() {
            return Err(AssetError::BootstrapStackRequired {
                environment: resources.environment().to_string(),
            });
        }

        for asset in &stack.assets {
            if reuse.contains(&asset.id) {
                tracing::debug!(asset = %asset.id, "reusing asset");
                continue;
            }
            tracing::debug!(asset = %asset.id, packaging = %asset.packaging, "preparing asset");
            let prepared = match asset.packaging.as_str() {
                "file" => self.prepare_file_asset(asset, toolkit, FilePackaging::File)?,
                "zip" => self.prepare_file_asset(asset, toolkit, FilePackaging::ZipDirectory)?,
                "container-image" => self.prepare_image_asset(asset, resources).await?,
                other => return Err(AssetError::UnsupportedPackaging(other.to_string())),
            };
            params.extend(prepared);
        }
        Ok(params)
    }

    fn prepare_file_asset(
        &mut self,
        asset: &AssetMetadata,
        toolkit: &ToolkitInfo,
        packaging: FilePackaging,
    ) -> Result<BTreeMap<String, String>, AssetError> {
        let bucket = toolkit
            .bucket_name()
            .ok_or_else(|| AssetError::BootstrapStackRequired {
                environment: toolkit.stack_name().to_string(),
            })?
            .to_string();
        let (prefix, base_name) = file_asset_key(asset, packaging);
        let key = format!("{prefix}{base_name}");
        tracing::debug!(asset = %asset.path, "storing asset at s3://{bucket}/{key}");

        self.add_file_asset(
            &asset.source_hash,
            FileSource {
                path: asset.path.clone(),
                packaging,
            },
            FileDestination {
                bucket_name: bucket.clone(),
                object_key: key,
            },
        );

        let mut params = BTreeMap::new();
        if let Some(name) = &asset.s3_bucket_parameter {
            params.insert(name.clone(), bucket);
        }
        if let Some(name) = &asset.s3_key_parameter {
            params.insert(
                name.clone(),
                format!("{prefix}{ASSET_PREFIX_SEPARATOR}{base_name}"),
            );
        }
        if let Some(name) = &asset.artifact_hash_parameter {
            params.insert(name.clone(), asset.source_hash.clone());
        }
        Ok(params)
    }

    async fn prepare_image_asset<S>(
        &mut self,
        asset: &AssetMetadata,
        resources: &EnvironmentResources<S>,
    ) -> Result<BTreeMap<String, String>, AssetError>
    where
        S: ProvisioningSdk + 'static,
    {
        if asset.image_name_parameter.is_none()
            && (asset.repository_name.is_none() || asset.image_tag.is_none())
        {
            return Err(AssetError::InvalidConfiguration(
                "\"repositoryName\" and \"imageTag\" are required when \"imageNameParameter\" is left out"
                    .to_string(),
            ));
        }

        let repository_name = asset
            .repository_name
            .clone()
            .unwrap_or_else(|| image_repository_name(&asset.id));
        let repository_uri = resources.prepare_image_repository(&repository_name).await?;
        let image_tag = asset
            .image_tag
            .clone()
            .unwrap_or_else(|| asset.source_hash.clone());

        self.add_image_asset(
            &asset.source_hash,
            ImageSource {
                directory: asset.path.clone(),
                docker_build_args: asset.build_args.clone(),
                docker_build_target: asset.target.clone(),
                docker_file: asset.file.clone(),
                platform: asset.platform.clone(),
            },
            ImageDestination {
                repository_name,
                image_tag: image_tag.clone(),
            },
        );

        let mut params = BTreeMap::new();
        if let Some(name) = &asset.image_name_parameter {
            params.insert(name.clone(), format!("{repository_uri}:{image_tag}"));
        }
        Ok(params)
    }
}
