// ABOUTME: Container image repository trait.
// ABOUTME: Describe and create repositories that receive image assets.

use super::error::ProvisionError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Image repository operations.
#[async_trait]
pub trait ImageRepositoryOps: Send + Sync {
    /// Repository URI, or `None` when the repository does not exist.
    async fn describe_repository(&self, name: &str) -> Result<Option<String>, ProvisionError>;

    /// Create a repository and return its URI (when the service reports one).
    async fn create_repository(
        &self,
        name: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<Option<String>, ProvisionError>;

    /// Enable vulnerability scanning on push.
    async fn enable_scan_on_push(&self, name: &str) -> Result<(), ProvisionError>;
}
