// ABOUTME: Asset publisher that records builds and uploads instead of running them.
// ABOUTME: Entries can be marked already published or made to fail.

use parking_lot::Mutex;
use stackpilot::assets::{
    AssetManifest, AssetPublisher, ManifestEntry, PublishError, PublisherFactory, PublisherOptions,
};
use stackpilot::environment::ResolvedEnvironment;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
struct Shared {
    built: Mutex<Vec<String>>,
    published: Mutex<Vec<String>>,
    already_published: Mutex<BTreeSet<String>>,
    failing: Mutex<BTreeSet<String>>,
    created: AtomicUsize,
    options: Mutex<Vec<PublisherOptions>>,
}

/// Creates publishers that share one record of what happened.
#[derive(Debug, Clone, Default)]
pub struct FakePublisherFactory {
    shared: Arc<Shared>,
}

impl FakePublisherFactory {
    pub fn mark_published(&self, asset_id: &str) {
        self.shared
            .already_published
            .lock()
            .insert(asset_id.to_string());
    }

    /// Builds of `asset_id` report a failure through `has_failures`.
    pub fn fail(&self, asset_id: &str) {
        self.shared.failing.lock().insert(asset_id.to_string());
    }

    pub fn built(&self) -> Vec<String> {
        self.shared.built.lock().clone()
    }

    pub fn published(&self) -> Vec<String> {
        self.shared.published.lock().clone()
    }

    /// How many publishers were created.
    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    pub fn options(&self) -> Vec<PublisherOptions> {
        self.shared.options.lock().clone()
    }
}

impl PublisherFactory for FakePublisherFactory {
    type Publisher = FakePublisher;

    fn create(
        &self,
        _manifest: &AssetManifest,
        _environment: &ResolvedEnvironment,
        options: PublisherOptions,
    ) -> FakePublisher {
        self.shared.created.fetch_add(1, Ordering::SeqCst);
        self.shared.options.lock().push(options);
        FakePublisher {
            shared: Arc::clone(&self.shared),
            failed: AtomicBool::new(false),
        }
    }
}

#[derive(Debug)]
pub struct FakePublisher {
    shared: Arc<Shared>,
    failed: AtomicBool,
}

#[async_trait::async_trait]
impl AssetPublisher for FakePublisher {
    async fn build_entry(&self, entry: &ManifestEntry) -> Result<(), PublishError> {
        self.shared.built.lock().push(entry.id().to_string());
        if self.shared.failing.lock().contains(entry.id()) {
            self.failed.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn publish_entry(&self, entry: &ManifestEntry) -> Result<(), PublishError> {
        self.shared.published.lock().push(entry.id().to_string());
        Ok(())
    }

    async fn is_entry_published(&self, entry: &ManifestEntry) -> Result<bool, PublishError> {
        Ok(self.shared.already_published.lock().contains(entry.id()))
    }

    fn has_failures(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}
