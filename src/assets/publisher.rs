// ABOUTME: Asset publisher seam and the per-manifest publisher cache.
// ABOUTME: One manifest identity maps to exactly one publisher for the coordinator's lifetime.

use super::manifest::{AssetManifest, ManifestEntry};
use crate::environment::ResolvedEnvironment;
use crate::types::ManifestId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("failed to build asset {asset}: {message}")]
    Build { asset: String, message: String },

    #[error("failed to publish asset {asset}: {message}")]
    Publish { asset: String, message: String },

    #[error("asset {asset} targets another account and cross-account publishing is not allowed")]
    CrossAccountNotAllowed { asset: String },

    #[error("{0}")]
    Other(String),
}

/// Builds and uploads manifest entries.
#[async_trait]
pub trait AssetPublisher: Send + Sync {
    async fn build_entry(&self, entry: &ManifestEntry) -> Result<(), PublishError>;

    async fn publish_entry(&self, entry: &ManifestEntry) -> Result<(), PublishError>;

    async fn is_entry_published(&self, entry: &ManifestEntry) -> Result<bool, PublishError>;

    /// Failures were reported through progress rather than as errors.
    fn has_failures(&self) -> bool;
}

/// How a publisher should behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherOptions {
    pub allow_cross_account: bool,
    pub build_assets: bool,
}

/// Creates publishers for a manifest.
pub trait PublisherFactory: Send + Sync + 'static {
    type Publisher: AssetPublisher + 'static;

    fn create(
        &self,
        manifest: &AssetManifest,
        environment: &ResolvedEnvironment,
        options: PublisherOptions,
    ) -> Self::Publisher;
}

/// Publishers keyed by manifest identity.
pub struct PublisherCache<P> {
    publishers: Mutex<HashMap<ManifestId, Arc<P>>>,
}

impl<P> Default for PublisherCache<P> {
    fn default() -> Self {
        Self {
            publishers: Mutex::new(HashMap::new()),
        }
    }
}

impl<P> std::fmt::Debug for PublisherCache<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublisherCache")
            .field("len", &self.publishers.lock().len())
            .finish()
    }
}

impl<P> PublisherCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached publisher for `manifest`, created under the lock on first use.
    pub fn get_or_create(&self, manifest: &AssetManifest, create: impl FnOnce() -> P) -> Arc<P> {
        let mut publishers = self.publishers.lock();
        Arc::clone(
            publishers
                .entry(manifest.id().clone())
                .or_insert_with(|| Arc::new(create())),
        )
    }

    pub fn len(&self) -> usize {
        self.publishers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
